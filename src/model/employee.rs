use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::monthly_payroll::MonthlyPayroll;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "employee_name": "John Doe",
        "employment_status": "Employed",
        "pf_applicable": "Yes",
        "esi_applicable": "No",
        "designation": "Engineer",
        "department": "Platform",
        "joining_date": "2024-01-01",
        "end_date": null,
        "current_salary": 85000.0,
        "bank_account_number": "001234567890",
        "bank_name": "HDFC",
        "bank_ifsc_code": "HDFC0000123",
        "payment_mode": "INR Account",
        "is_active": true
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John Doe")]
    pub employee_name: String,

    #[schema(example = "Employed")]
    pub employment_status: String,

    #[schema(example = "Yes")]
    pub pf_applicable: String,

    #[schema(example = "No")]
    pub esi_applicable: String,

    #[schema(example = "Engineer", nullable = true)]
    pub designation: Option<String>,

    #[schema(example = "Platform", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub joining_date: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,

    #[schema(example = 85000.0)]
    pub current_salary: f64,

    #[schema(nullable = true)]
    pub bank_account_number: Option<String>,

    #[schema(nullable = true)]
    pub bank_name: Option<String>,

    #[schema(nullable = true)]
    pub bank_ifsc_code: Option<String>,

    #[schema(example = "INR Account")]
    pub payment_mode: String,

    pub is_active: bool,
}

/// An employee together with the payroll row of one month, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeWithPayroll {
    #[serde(flatten)]
    pub employee: Employee,
    pub payroll: Option<MonthlyPayroll>,
}

/// Employee columns that may be edited through the workspace.
pub const EDITABLE_EMPLOYEE_FIELDS: &[&str] = &[
    "employee_code",
    "employee_name",
    "employment_status",
    "pf_applicable",
    "esi_applicable",
    "designation",
    "department",
    "joining_date",
    "end_date",
    "current_salary",
    "bank_account_number",
    "bank_name",
    "bank_ifsc_code",
    "payment_mode",
];
