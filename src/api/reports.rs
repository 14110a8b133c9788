use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::{PeriodQuery, parse_period, resolve_period, workflow_failure};
use crate::auth::auth::AuthUser;
use crate::model::employee::EmployeeWithPayroll;
use crate::model::payroll_report::{PayrollReport, PayrollReportSummary, ReportType};
use crate::payroll::dashboard::DashboardStats;
use crate::payroll::month::YearMonth;
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::PayrollWorkflow;

#[derive(Serialize, ToSchema)]
pub struct PayrollReportDetail {
    #[serde(flatten)]
    pub summary: PayrollReportSummary,
    pub finance_approved_by: Option<u64>,
    #[schema(value_type = Vec<Object>)]
    pub report_data: Vec<EmployeeWithPayroll>,
}

impl From<PayrollReport> for PayrollReportDetail {
    fn from(report: PayrollReport) -> Self {
        Self {
            summary: PayrollReportSummary::from(&report),
            finance_approved_by: report.finance_approved_by,
            report_data: report.report_data,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub period: YearMonth,
    #[serde(flatten)]
    pub stats: DashboardStats,
}

#[utoipa::path(
    get,
    path = "/api/payroll/reports",
    responses(
        (status = 200, description = "Stored reports, newest first", body = [PayrollReportSummary])
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Reports"
)]
pub async fn list_reports<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
) -> actix_web::Result<HttpResponse> {
    match workflow.store().list_reports().await {
        Ok(reports) => {
            let data: Vec<PayrollReportSummary> = reports.iter().map(PayrollReportSummary::from).collect();
            Ok(HttpResponse::Ok().json(data))
        }
        Err(e) => Ok(workflow_failure(&e.into())),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll/reports/{year}/{month}",
    params(
        ("year" = i32, Path, description = "Report year"),
        ("month" = u32, Path, description = "Report month, 1-12")
    ),
    responses(
        (status = 200, description = "Snapshot of a finalized month", body = PayrollReportDetail),
        (status = 404, description = "No snapshot for that month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Reports"
)]
pub async fn get_report<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<(i32, u32)>,
) -> actix_web::Result<HttpResponse> {
    let (year, month) = path.into_inner();
    let period = match parse_period(year, month) {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    match workflow.store().find_report(period, ReportType::Snapshot).await {
        Ok(Some(report)) => Ok(HttpResponse::Ok().json(PayrollReportDetail::from(report))),
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({
            "message": format!("No payroll snapshot for {}", period.label())
        }))),
        Err(e) => Ok(workflow_failure(&e.into())),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll/dashboard",
    params(PeriodQuery),
    responses(
        (status = 200, body = DashboardResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Reports"
)]
pub async fn dashboard<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<HttpResponse> {
    let period = match resolve_period(&workflow, &query).await {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    match workflow.dashboard(period).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(DashboardResponse { period, stats })),
        Err(e) => Ok(workflow_failure(&e)),
    }
}
