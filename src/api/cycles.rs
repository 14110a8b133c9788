use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::{parse_period, workflow_failure};
use crate::auth::auth::AuthUser;
use crate::model::payroll_cycle::PayrollCycleResponse;
use crate::model::payroll_lock::LockStats;
use crate::payroll::month::YearMonth;
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::PayrollWorkflow;

#[derive(Deserialize, ToSchema)]
pub struct CreateCycle {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 10)]
    pub month: u32,
}

#[derive(Serialize, ToSchema)]
pub struct CycleListResponse {
    pub data: Vec<PayrollCycleResponse>,
    pub active_month: YearMonth,
    #[schema(example = "October 2025")]
    pub active_label: String,
    pub company_start: YearMonth,
}

#[utoipa::path(
    get,
    path = "/api/payroll/cycles",
    responses(
        (status = 200, description = "All cycles, oldest first", body = CycleListResponse),
        (status = 401)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Cycles"
)]
pub async fn list_cycles<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
) -> actix_web::Result<HttpResponse> {
    let progression = match workflow.progression().await {
        Ok(p) => p,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let active = progression.active_month();
    Ok(HttpResponse::Ok().json(CycleListResponse {
        data: progression.cycles().iter().map(PayrollCycleResponse::from).collect(),
        active_month: active,
        active_label: active.label(),
        company_start: progression.company_start(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles",
    request_body = CreateCycle,
    responses(
        (status = 200, description = "Existing or newly opened cycle", body = PayrollCycleResponse),
        (status = 400, description = "Invalid month"),
        (status = 409, description = "Previous month not finalized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Cycles"
)]
pub async fn get_or_create_cycle<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    payload: web::Json<CreateCycle>,
) -> actix_web::Result<HttpResponse> {
    let period = match parse_period(payload.year, payload.month) {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    match workflow.get_or_create_cycle(period, auth.actor()).await {
        Ok(cycle) => {
            info!(cycle_id = cycle.id, user_id = auth.user_id, "Payroll cycle resolved");
            Ok(HttpResponse::Ok().json(PayrollCycleResponse::from(&cycle)))
        }
        Err(e) => Ok(workflow_failure(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll/cycles/{cycle_id}/stats",
    params(("cycle_id" = u64, Path, description = "Payroll cycle ID")),
    responses(
        (status = 200, body = LockStats),
        (status = 404, description = "Cycle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Cycles"
)]
pub async fn cycle_stats<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    match workflow.lock_stats(path.into_inner()).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(stats)),
        Err(e) => Ok(workflow_failure(&e)),
    }
}
