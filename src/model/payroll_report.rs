use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::employee::EmployeeWithPayroll;
use crate::payroll::month::YearMonth;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportType {
    Snapshot,
}

/// Report keyed by (month, year, report_type). A snapshot holds the rows of
/// a finalized month verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollReport {
    pub id: u64,
    pub period: YearMonth,
    pub report_name: String,
    pub report_type: ReportType,
    pub total_employees: i64,
    pub total_gross_salary: f64,
    pub total_deductions: f64,
    pub total_net_salary: f64,
    pub generated_by: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finance_approved_by: Option<u64>,
    pub report_data: Vec<EmployeeWithPayroll>,
}

/// Column layout of `payroll_reports`; `report_data` is JSON text.
#[derive(Debug, sqlx::FromRow)]
pub struct PayrollReportRow {
    pub id: u64,
    pub month: u32,
    pub year: i32,
    pub report_name: String,
    pub report_type: String,
    pub total_employees: i64,
    pub total_gross_salary: f64,
    pub total_deductions: f64,
    pub total_net_salary: f64,
    pub generated_by: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finance_approved_by: Option<u64>,
    pub report_data: String,
}

/// Listing entry without the row payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollReportSummary {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = "Payroll Report - October 2025")]
    pub report_name: String,
    pub report_type: ReportType,
    #[schema(example = 240)]
    pub total_employees: i64,
    pub total_gross_salary: f64,
    pub total_deductions: f64,
    pub total_net_salary: f64,
    pub generated_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
    pub is_finalized: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&PayrollReport> for PayrollReportSummary {
    fn from(report: &PayrollReport) -> Self {
        Self {
            id: report.id,
            month: report.period.month,
            year: report.period.year,
            report_name: report.report_name.clone(),
            report_type: report.report_type,
            total_employees: report.total_employees,
            total_gross_salary: report.total_gross_salary,
            total_deductions: report.total_deductions,
            total_net_salary: report.total_net_salary,
            generated_by: report.generated_by,
            generated_at: report.generated_at,
            is_finalized: report.is_finalized,
            finalized_at: report.finalized_at,
        }
    }
}
