//! Per-user page state: the selected month and the pending edit buffer.
//!
//! Each request loads the caller's workspace from the cache, re-syncs the
//! navigator against the current cycle history and stores it back.

use std::collections::BTreeMap;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::api::{edit_failure, parse_period, workflow_failure};
use crate::auth::auth::AuthUser;
use crate::payroll::edit_buffer::{EditGuard, FieldTarget, RowEdits};
use crate::payroll::month::YearMonth;
use crate::payroll::progression::{MonthProgression, NavigationState};
use crate::payroll::store::PayrollStore;
use crate::payroll::workflow::{PayrollWorkflow, WorkflowError};
use crate::utils::workspace_cache::{Workspace, WorkspaceCache};

#[derive(Serialize, ToSchema)]
pub struct WorkspaceResponse {
    pub navigation: NavigationState,
    /// Pending edits keyed by employee id.
    #[schema(value_type = Object)]
    pub edits: BTreeMap<u64, RowEdits>,
    pub dirty_ids: Vec<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct GotoRequest {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 11)]
    pub month: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct FieldEdit {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "deduction_amount")]
    pub field: String,
    #[schema(value_type = Object, example = json!("1500"))]
    pub value: Value,
    pub target: FieldTarget,
}

enum Navigation {
    Next,
    Prev,
    Active,
    Goto(YearMonth),
}

fn respond(workspace: &Workspace, progression: &MonthProgression) -> HttpResponse {
    HttpResponse::Ok().json(WorkspaceResponse {
        navigation: workspace.navigator.state(progression),
        edits: workspace.edits.rows().clone(),
        dirty_ids: workspace.edits.dirty_ids(),
    })
}

/// Pending edits belong to the month they were made in; a month change drops them.
fn sync(workspace: &mut Workspace, progression: &MonthProgression) -> YearMonth {
    let before = workspace.navigator.selected(progression);
    let after = workspace.navigator.sync(progression);
    if before != after {
        debug!(from = %before, to = %after, "Selected month re-snapped, pending edits dropped");
        workspace.edits.clear();
    }
    after
}

/// Loads the workspace and the progression it is synced against.
async fn open<S: PayrollStore>(
    auth: &AuthUser,
    workflow: &PayrollWorkflow<S>,
    cache: &WorkspaceCache,
) -> Result<(Workspace, MonthProgression, YearMonth), WorkflowError> {
    let progression = workflow.progression().await?;
    let mut workspace = cache.load(auth.user_id).await;
    let selected = sync(&mut workspace, &progression);
    Ok((workspace, progression, selected))
}

async fn navigate<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
    action: Navigation,
) -> actix_web::Result<HttpResponse> {
    let (mut workspace, progression, before) = match open(&auth, &workflow, &cache).await {
        Ok(opened) => opened,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let moved = match action {
        Navigation::Next => workspace.navigator.go_next(&progression),
        Navigation::Prev => workspace.navigator.go_prev(&progression),
        Navigation::Goto(target) => workspace.navigator.go_to_month(&progression, target),
        Navigation::Active => {
            workspace.navigator.go_to_active(&progression);
            true
        }
    };

    let after = workspace.navigator.selected(&progression);
    if before != after {
        workspace.edits.clear();
    }
    debug!(user_id = auth.user_id, moved, selected = %after, "Workspace navigated");

    let response = respond(&workspace, &progression);
    cache.store(auth.user_id, workspace).await;
    Ok(response)
}

/// Edit guard for the selected month, built from the caller's role and the
/// month's status and locks.
async fn guard_for<S: PayrollStore>(
    auth: &AuthUser,
    workflow: &PayrollWorkflow<S>,
    progression: &MonthProgression,
    selected: YearMonth,
) -> Result<EditGuard, WorkflowError> {
    let locks = match progression.cycle(selected) {
        Some(cycle) => workflow.list_locks(cycle.id).await?,
        None => Vec::new(),
    };
    Ok(EditGuard::new(auth.role, progression.status_of(selected), locks))
}

#[utoipa::path(
    get,
    path = "/api/payroll/workspace",
    responses((status = 200, body = WorkspaceResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn get_workspace<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
) -> actix_web::Result<HttpResponse> {
    let (workspace, progression, _) = match open(&auth, &workflow, &cache).await {
        Ok(opened) => opened,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let response = respond(&workspace, &progression);
    cache.store(auth.user_id, workspace).await;
    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/api/payroll/workspace",
    responses((status = 200, description = "Workspace dropped; pending edits discarded")),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn reset_workspace(auth: AuthUser, cache: web::Data<WorkspaceCache>) -> actix_web::Result<HttpResponse> {
    cache.discard(auth.user_id).await;
    info!(user_id = auth.user_id, "Workspace reset");
    Ok(HttpResponse::Ok().json(json!({ "message": "Workspace reset" })))
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/next",
    responses((status = 200, description = "Unchanged when the next month is not open", body = WorkspaceResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn go_next<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
) -> actix_web::Result<HttpResponse> {
    navigate(auth, workflow, cache, Navigation::Next).await
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/prev",
    responses((status = 200, description = "Unchanged at the company start month", body = WorkspaceResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn go_prev<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
) -> actix_web::Result<HttpResponse> {
    navigate(auth, workflow, cache, Navigation::Prev).await
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/active",
    responses((status = 200, body = WorkspaceResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn go_to_active<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
) -> actix_web::Result<HttpResponse> {
    navigate(auth, workflow, cache, Navigation::Active).await
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/goto",
    request_body = GotoRequest,
    responses(
        (status = 200, description = "Unchanged unless the target is active or finalized", body = WorkspaceResponse),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn go_to_month<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
    payload: web::Json<GotoRequest>,
) -> actix_web::Result<HttpResponse> {
    let target = match parse_period(payload.year, payload.month) {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };
    navigate(auth, workflow, cache, Navigation::Goto(target)).await
}

#[utoipa::path(
    put,
    path = "/api/payroll/workspace/edits",
    request_body = FieldEdit,
    responses(
        (status = 200, description = "Pending edits of the row", body = RowEdits),
        (status = 400, description = "Unknown field or non-numeric amount")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn update_field<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
    payload: web::Json<FieldEdit>,
) -> actix_web::Result<HttpResponse> {
    let (mut workspace, _, _) = match open(&auth, &workflow, &cache).await {
        Ok(opened) => opened,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let edit = payload.into_inner();
    if let Err(e) = workspace
        .edits
        .update_field(edit.employee_id, &edit.field, edit.value, edit.target)
    {
        return Ok(edit_failure(&e));
    }

    let response = HttpResponse::Ok().json(workspace.edits.row(edit.employee_id));
    cache.store(auth.user_id, workspace).await;
    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/api/payroll/workspace/edits/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses((status = 200, description = "Pending edits discarded")),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn cancel_row(
    auth: AuthUser,
    cache: web::Data<WorkspaceCache>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = path.into_inner();
    let mut workspace = cache.load(auth.user_id).await;
    let discarded = workspace.edits.cancel(employee_id);
    cache.store(auth.user_id, workspace).await;

    Ok(HttpResponse::Ok().json(json!({ "employee_id": employee_id, "discarded": discarded })))
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/edits/{employee_id}/save",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Saved, or nothing pending"),
        (status = 403, description = "Row not editable in the current state"),
        (status = 404, description = "Employee not in the selected month"),
        (status = 422, description = "Amount missing for a selected type")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn save_row<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = path.into_inner();
    let (mut workspace, progression, selected) = match open(&auth, &workflow, &cache).await {
        Ok(opened) => opened,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let rows = match workflow.month_rows(selected).await {
        Ok(m) => m.rows,
        Err(e) => return Ok(workflow_failure(&e)),
    };
    let Some(row) = rows.iter().find(|r| r.employee.id == employee_id) else {
        cache.store(auth.user_id, workspace).await;
        return Ok(HttpResponse::NotFound().json(json!({
            "message": format!("Employee {employee_id} not found in {}", selected.label())
        })));
    };

    let guard = match guard_for(&auth, &workflow, &progression, selected).await {
        Ok(g) => g,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let result = workspace.edits.save_row(workflow.store(), row, selected, &guard).await;
    cache.store(auth.user_id, workspace).await;

    match result {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({ "employee_id": employee_id, "outcome": outcome }))),
        Err(e) => Ok(edit_failure(&e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/workspace/save-all",
    responses(
        (status = 200, description = "Saved/failed tally; failed rows keep their edits", body = crate::payroll::edit_buffer::SaveAllTally)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Workspace"
)]
pub async fn save_all<S: PayrollStore>(
    auth: AuthUser,
    workflow: web::Data<PayrollWorkflow<S>>,
    cache: web::Data<WorkspaceCache>,
) -> actix_web::Result<HttpResponse> {
    let (mut workspace, progression, selected) = match open(&auth, &workflow, &cache).await {
        Ok(opened) => opened,
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let (rows, guard) = match futures::try_join!(
        workflow.month_rows(selected),
        guard_for(&auth, &workflow, &progression, selected)
    ) {
        Ok((m, g)) => (m.rows, g),
        Err(e) => return Ok(workflow_failure(&e)),
    };

    let tally = workspace.edits.save_all(workflow.store(), &rows, selected, &guard).await;
    cache.store(auth.user_id, workspace).await;

    info!(user_id = auth.user_id, saved = tally.saved, failed = tally.failed, "Workspace save-all handled");
    Ok(HttpResponse::Ok().json(tally))
}
