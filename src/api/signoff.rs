use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::api::workflow_failure;
use crate::auth::auth::AuthUser;
use crate::model::payroll_cycle::PayrollCycleResponse;
use crate::model::payroll_lock::LockRole;
use crate::model::payroll_report::PayrollReportSummary;
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::PayrollWorkflow;

#[derive(Deserialize, ToSchema)]
pub struct RevertRequest {
    #[schema(example = "Salary sheet uploaded for the wrong month")]
    pub reason: String,
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles/{cycle_id}/hr-signoff",
    params(("cycle_id" = u64, Path, description = "Payroll cycle ID")),
    responses(
        (status = 200, description = "HR signed off", body = PayrollCycleResponse),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Already signed off, or not every active employee is HR-locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Sign-off"
)]
pub async fn hr_signoff<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_lock_role(LockRole::Hr)?;
    let cycle_id = path.into_inner();
    info!(cycle_id, username = %auth.username, "HR sign-off requested");

    match workflow.hr_signoff(cycle_id, auth.actor()).await {
        Ok(cycle) => Ok(HttpResponse::Ok().json(json!({
            "message": "HR sign-off recorded",
            "cycle": PayrollCycleResponse::from(&cycle),
        }))),
        Err(e) => Ok(workflow_failure(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles/{cycle_id}/finance-signoff",
    params(("cycle_id" = u64, Path, description = "Payroll cycle ID")),
    responses(
        (status = 200, description = "Payroll finalized and snapshot stored"),
        (status = 403, description = "Finance/Admin only"),
        (status = 409, description = "Previous month open or Finance locks incomplete")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Sign-off"
)]
pub async fn finance_signoff<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_lock_role(LockRole::Finance)?;
    let cycle_id = path.into_inner();
    info!(cycle_id, username = %auth.username, "Finance sign-off requested");

    match workflow.finance_signoff(cycle_id, auth.actor()).await {
        Ok(outcome) => {
            let message = if outcome.snapshot.is_some() {
                "Payroll finalized"
            } else {
                "Payroll finalized, but the snapshot could not be stored"
            };
            Ok(HttpResponse::Ok().json(json!({
                "message": message,
                "cycle": PayrollCycleResponse::from(&outcome.cycle),
                "snapshot": outcome.snapshot.as_ref().map(PayrollReportSummary::from),
            })))
        }
        Err(e) => Ok(workflow_failure(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles/{cycle_id}/revert",
    request_body = RevertRequest,
    params(("cycle_id" = u64, Path, description = "Payroll cycle ID")),
    responses(
        (status = 200, description = "Cycle back to pending; locks kept", body = PayrollCycleResponse),
        (status = 400, description = "Reason missing"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Nothing to revert")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Sign-off"
)]
pub async fn revert_payroll<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
    payload: web::Json<RevertRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let cycle_id = path.into_inner();
    info!(cycle_id, username = %auth.username, "Payroll revert requested");

    match workflow.revert_payroll(cycle_id, &payload.reason, auth.actor()).await {
        Ok(cycle) => Ok(HttpResponse::Ok().json(json!({
            "message": "Payroll reverted to pending",
            "cycle": PayrollCycleResponse::from(&cycle),
        }))),
        Err(e) => Ok(workflow_failure(&e)),
    }
}
