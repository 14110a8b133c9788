use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::{PeriodQuery, resolve_period, workflow_failure};
use crate::auth::auth::AuthUser;
use crate::model::employee::{Employee, EmployeeWithPayroll};
use crate::payroll::filter::EmployeeFilter;
use crate::payroll::month::YearMonth;
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::{PayrollWorkflow, RowSource};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "Employed")]
    pub employment_status: Option<String>,
    #[schema(example = "Yes")]
    pub pf_applicable: Option<String>,
    #[schema(example = "No")]
    pub esi_applicable: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub joining_date: Option<NaiveDate>,
    #[schema(example = 85000.0)]
    pub current_salary: Option<f64>,
    pub bank_account_number: Option<String>,
    pub bank_name: Option<String>,
    pub bank_ifsc_code: Option<String>,
    #[schema(example = "INR Account")]
    pub payment_mode: Option<String>,
}

impl CreateEmployee {
    fn into_employee(self) -> Employee {
        Employee {
            id: 0,
            employee_code: self.employee_code.trim().to_string(),
            employee_name: self.employee_name.trim().to_string(),
            employment_status: self.employment_status.unwrap_or_else(|| "Employed".to_string()),
            pf_applicable: self.pf_applicable.unwrap_or_else(|| "No".to_string()),
            esi_applicable: self.esi_applicable.unwrap_or_else(|| "No".to_string()),
            designation: self.designation,
            department: self.department,
            joining_date: self.joining_date,
            end_date: None,
            current_salary: self.current_salary.unwrap_or(0.0),
            bank_account_number: self.bank_account_number,
            bank_name: self.bank_name,
            bank_ifsc_code: self.bank_ifsc_code,
            payment_mode: self.payment_mode.unwrap_or_else(|| "INR Account".to_string()),
            is_active: true,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, from 1
    pub page: Option<u32>,
    /// Items per page, at most 500
    pub per_page: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(100).clamp(1, 500)
    }

    /// Rows before the requested page; saturates for pages far past the end.
    fn offset(&self) -> usize {
        (self.page() as usize - 1).saturating_mul(self.per_page() as usize)
    }

    fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter().skip(self.offset()).take(self.per_page() as usize).collect()
    }
}

#[derive(Serialize, ToSchema)]
pub struct PayrollRowsResponse {
    pub source: RowSource,
    pub period: YearMonth,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<EmployeeWithPayroll>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 100)]
    pub per_page: u32,
    #[schema(example = 240)]
    pub total: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct SetActive {
    pub is_active: bool,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UploadFailure {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UploadTally {
    pub created: u32,
    pub failed: u32,
    pub failures: Vec<UploadFailure>,
}

fn check_required(payload: &CreateEmployee) -> Result<(), String> {
    if payload.employee_code.trim().is_empty() {
        return Err("employee_code is required".to_string());
    }
    if payload.employee_name.trim().is_empty() {
        return Err("employee_name is required".to_string());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/payroll/employees",
    params(PeriodQuery, EmployeeFilter, PageQuery),
    responses(
        (status = 200, description = "Filtered rows of a month; snapshot rows once finalized", body = PayrollRowsResponse),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn list_payroll_rows<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    period: web::Query<PeriodQuery>,
    filter: web::Query<EmployeeFilter>,
    page: web::Query<PageQuery>,
) -> actix_web::Result<HttpResponse> {
    let period = match resolve_period(&workflow, &period).await {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    let month = match workflow.month_rows(period).await {
        Ok(m) => m,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let rows = filter.apply(month.rows);
    let total = rows.len();

    Ok(HttpResponse::Ok().json(PayrollRowsResponse {
        source: month.source,
        period,
        data: page.slice(rows),
        page: page.page(),
        per_page: page.per_page(),
        total,
    }))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 200, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 1
        })),
        (status = 400, description = "Missing code or name"),
        (status = 409, description = "Employee code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn create_employee<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<HttpResponse> {
    auth.require_hr_or_admin()?;

    let payload = payload.into_inner();
    if let Err(message) = check_required(&payload) {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": message })));
    }

    let employee = payload.into_employee();
    match workflow.store().insert_employee(&employee).await {
        Ok(id) => {
            info!(employee_id = id, user_id = auth.user_id, "Employee created");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Employee created successfully",
                "id": id
            })))
        }
        Err(e) => Ok(workflow_failure(&e.into())),
    }
}

#[utoipa::path(
    post,
    path = "/api/employees/bulk",
    request_body = Vec<CreateEmployee>,
    responses(
        (status = 200, description = "Per-row outcome tally", body = UploadTally)
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn bulk_create_employees<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    payload: web::Json<Vec<CreateEmployee>>,
) -> actix_web::Result<HttpResponse> {
    auth.require_hr_or_admin()?;

    let store = workflow.store();
    let tally = stream::iter(payload.into_inner())
        .fold(UploadTally::default(), |mut tally, row| async move {
            let code = row.employee_code.clone();
            let outcome = match check_required(&row) {
                Ok(()) => store
                    .insert_employee(&row.into_employee())
                    .await
                    .map(|_| ())
                    .map_err(|e| {
                        error!(error = %e, employee_code = %code, "Failed to insert uploaded employee");
                        e.to_string()
                    }),
                Err(message) => Err(message),
            };
            match outcome {
                Ok(()) => tally.created += 1,
                Err(message) => {
                    tally.failed += 1;
                    tally.failures.push(UploadFailure {
                        employee_code: code,
                        message,
                    });
                }
            }
            tally
        })
        .await;

    info!(
        created = tally.created,
        failed = tally.failed,
        user_id = auth.user_id,
        "Employee upload finished"
    );
    Ok(HttpResponse::Ok().json(tally))
}

#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}/active",
    request_body = SetActive,
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Active flag updated"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn set_employee_active<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
    payload: web::Json<SetActive>,
) -> actix_web::Result<HttpResponse> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();
    match workflow.store().set_employee_active(employee_id, payload.is_active).await {
        Ok(()) => {
            info!(employee_id, is_active = payload.is_active, user_id = auth.user_id, "Employee active flag set");
            Ok(HttpResponse::Ok().json(json!({
                "message": if payload.is_active { "Employee activated" } else { "Employee deactivated" }
            })))
        }
        Err(e) => Ok(workflow_failure(&e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(code: &str, name: &str) -> CreateEmployee {
        CreateEmployee {
            employee_code: code.to_string(),
            employee_name: name.to_string(),
            employment_status: None,
            pf_applicable: None,
            esi_applicable: None,
            designation: None,
            department: None,
            joining_date: None,
            current_salary: None,
            bank_account_number: None,
            bank_name: None,
            bank_ifsc_code: None,
            payment_mode: None,
        }
    }

    #[test]
    fn new_employees_get_defaults() {
        let employee = payload(" EMP-9 ", "Asha").into_employee();
        assert_eq!(employee.employee_code, "EMP-9");
        assert_eq!(employee.employment_status, "Employed");
        assert_eq!(employee.payment_mode, "INR Account");
        assert_eq!(employee.current_salary, 0.0);
        assert!(employee.is_active);
    }

    fn page(page: Option<u32>, per_page: Option<u32>) -> PageQuery {
        PageQuery { page, per_page }
    }

    #[test]
    fn pages_default_and_clamp() {
        let query = page(None, None);
        assert_eq!((query.page(), query.per_page(), query.offset()), (1, 100, 0));

        let query = page(Some(0), Some(10_000));
        assert_eq!((query.page(), query.per_page(), query.offset()), (1, 500, 0));

        assert_eq!(page(Some(3), Some(2)).slice((1..=10).collect::<Vec<i32>>()), vec![5, 6]);
    }

    #[test]
    fn page_far_past_the_end_is_empty() {
        let query = page(Some(10_000_000), Some(500));
        assert_eq!(query.offset(), 4_999_999_500);
        assert!(query.slice((1..=10).collect::<Vec<u32>>()).is_empty());

        assert!(page(Some(u32::MAX), Some(500)).slice(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn code_and_name_are_required() {
        assert!(check_required(&payload("", "Asha")).is_err());
        assert!(check_required(&payload("EMP-1", "  ")).is_err());
        assert!(check_required(&payload("EMP-1", "Asha")).is_ok());
    }
}
