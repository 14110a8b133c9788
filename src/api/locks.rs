use std::str::FromStr;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::api::workflow_failure;
use crate::auth::auth::AuthUser;
use crate::model::payroll_lock::{EmployeePayrollLock, LockRole};
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::{BulkTally, PayrollWorkflow};

#[derive(Deserialize, ToSchema)]
pub struct ToggleLockRequest {
    /// Lock state the caller currently sees; the toggle flips it.
    #[schema(example = false)]
    pub currently_locked: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkLockRequest {
    /// Target employees; every active employee when omitted.
    #[schema(example = json!([1, 2, 3]))]
    pub employee_ids: Option<Vec<u64>>,
    #[schema(example = true)]
    pub lock: bool,
}

fn parse_role(raw: &str) -> Result<LockRole, HttpResponse> {
    LockRole::from_str(raw).map_err(|_| {
        HttpResponse::NotFound().json(json!({ "message": format!("Unknown lock role: {raw}") }))
    })
}

#[utoipa::path(
    get,
    path = "/api/payroll/cycles/{cycle_id}/locks",
    params(("cycle_id" = u64, Path, description = "Payroll cycle ID")),
    responses(
        (status = 200, body = [EmployeePayrollLock]),
        (status = 404, description = "Cycle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Locks"
)]
pub async fn list_locks<S: PayrollStore>(
    _auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    match workflow.list_locks(path.into_inner()).await {
        Ok(locks) => Ok(HttpResponse::Ok().json(locks)),
        Err(e) => Ok(workflow_failure(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles/{cycle_id}/locks/{role}/{employee_id}",
    request_body = ToggleLockRequest,
    params(
        ("cycle_id" = u64, Path, description = "Payroll cycle ID"),
        ("role" = LockRole, Path, description = "hr or finance"),
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Lock toggled"),
        (status = 403, description = "Role may not toggle this lock"),
        (status = 409, description = "Cycle already finalized"),
        (status = 422, description = "Required fields missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Locks"
)]
pub async fn toggle_lock<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<(u64, String, u64)>,
    payload: web::Json<ToggleLockRequest>,
) -> actix_web::Result<HttpResponse> {
    let (cycle_id, role, employee_id) = path.into_inner();
    let role = match parse_role(&role) {
        Ok(r) => r,
        Err(resp) => return Ok(resp),
    };
    auth.require_lock_role(role)?;

    match workflow
        .toggle_lock(role, employee_id, cycle_id, payload.currently_locked, auth.actor())
        .await
    {
        Ok(lock) => Ok(HttpResponse::Ok().json(json!({
            "message": if payload.currently_locked { "Employee unlocked" } else { "Employee locked" },
            "lock": lock,
        }))),
        Err(e) => Ok(workflow_failure(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/cycles/{cycle_id}/locks/{role}",
    request_body = BulkLockRequest,
    params(
        ("cycle_id" = u64, Path, description = "Payroll cycle ID"),
        ("role" = LockRole, Path, description = "hr or finance")
    ),
    responses(
        (status = 200, description = "Per-employee outcome tally", body = BulkTally),
        (status = 403, description = "Role may not change these locks")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Locks"
)]
pub async fn bulk_lock<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    path: web::Path<(u64, String)>,
    payload: web::Json<BulkLockRequest>,
) -> actix_web::Result<HttpResponse> {
    let (cycle_id, role) = path.into_inner();
    let role = match parse_role(&role) {
        Ok(r) => r,
        Err(resp) => return Ok(resp),
    };
    auth.require_lock_role(role)?;

    let payload = payload.into_inner();
    let employee_ids = match payload.employee_ids {
        Some(ids) => ids,
        None => {
            let cycle = match workflow.require_cycle(cycle_id).await {
                Ok(c) => c,
                Err(e) => return Ok(workflow_failure(&e)),
            };
            match workflow.store().list_employees_with_payroll(cycle.period).await {
                Ok(rows) => rows
                    .into_iter()
                    .filter(|r| r.employee.is_active)
                    .map(|r| r.employee.id)
                    .collect(),
                Err(e) => return Ok(workflow_failure(&e.into())),
            }
        }
    };

    let tally = workflow
        .bulk_lock(role, cycle_id, &employee_ids, payload.lock, auth.actor())
        .await;
    info!(
        cycle_id,
        %role,
        user_id = auth.user_id,
        success = tally.success,
        skipped = tally.skipped,
        failed = tally.failed,
        "Bulk lock request handled"
    );

    Ok(HttpResponse::Ok().json(tally))
}
