pub mod cycles;
pub mod employees;
pub mod locks;
pub mod reports;
pub mod signoff;
pub mod workspace;

use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::payroll::edit_buffer::EditError;
use crate::payroll::month::YearMonth;
use crate::payroll::store::{PayrollStore, StoreError};
use crate::payroll::workflow::{PayrollWorkflow, WorkflowError};

/// Optional month selector; defaults to the active month.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// e.g. 2025
    pub year: Option<i32>,
    /// 1-12
    pub month: Option<u32>,
}

/// Resolves a year/month pair to a period or a 400 response.
pub fn parse_period(year: i32, month: u32) -> Result<YearMonth, HttpResponse> {
    YearMonth::new(year, month)
        .ok_or_else(|| HttpResponse::BadRequest().json(json!({ "message": "month must be between 1 and 12" })))
}

/// Uses the explicit period when both parts are given, the active month otherwise.
pub async fn resolve_period<S: PayrollStore>(
    workflow: &PayrollWorkflow<S>,
    query: &PeriodQuery,
) -> Result<YearMonth, HttpResponse> {
    match (query.year, query.month) {
        (Some(year), Some(month)) => parse_period(year, month),
        (None, None) => workflow
            .progression()
            .await
            .map(|p| p.active_month())
            .map_err(|e| workflow_failure(&e)),
        _ => Err(HttpResponse::BadRequest().json(json!({ "message": "year and month must be given together" }))),
    }
}

fn store_failure(e: &StoreError) -> HttpResponse {
    match e {
        StoreError::NotFound(what) => HttpResponse::NotFound().json(json!({ "message": format!("{what} not found") })),
        StoreError::InvalidUpdate(reason) => HttpResponse::BadRequest().json(json!({ "message": reason })),
        StoreError::Unavailable(_) => HttpResponse::ServiceUnavailable().json(json!({ "message": e.to_string() })),
        StoreError::Duplicate(_) => HttpResponse::Conflict().json(json!({ "message": e.to_string() })),
        StoreError::Database(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23000") => {
            HttpResponse::Conflict().json(json!({ "message": "Record already exists" }))
        }
        _ => {
            tracing::error!(error = %e, "Backend failure");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    }
}

pub fn workflow_failure(e: &WorkflowError) -> HttpResponse {
    match e {
        WorkflowError::CycleNotFound(_) => HttpResponse::NotFound().json(json!({ "message": e.to_string() })),
        WorkflowError::MissingLockFields { missing_fields, .. } => HttpResponse::UnprocessableEntity().json(json!({
            "message": e.to_string(),
            "missing_fields": missing_fields,
        })),
        WorkflowError::MissingReason => HttpResponse::BadRequest().json(json!({ "message": e.to_string() })),
        WorkflowError::EligibilityUnavailable => {
            HttpResponse::ServiceUnavailable().json(json!({ "message": e.to_string() }))
        }
        WorkflowError::MonthNotAccessible(_)
        | WorkflowError::HrLocksIncomplete { .. }
        | WorkflowError::PreviousMonthNotFinalized(_)
        | WorkflowError::FinanceLocksIncomplete { .. }
        | WorkflowError::AlreadyFinalized(_)
        | WorkflowError::AlreadyHrSigned(_)
        | WorkflowError::NothingToRevert(_) => HttpResponse::Conflict().json(json!({ "message": e.to_string() })),
        WorkflowError::Store(inner) => store_failure(inner),
    }
}

pub fn edit_failure(e: &EditError) -> HttpResponse {
    match e {
        EditError::UnknownField(_) | EditError::InvalidValue { .. } => {
            HttpResponse::BadRequest().json(json!({ "message": e.to_string() }))
        }
        EditError::Invalid(errors) => HttpResponse::UnprocessableEntity().json(json!({
            "message": e.to_string(),
            "errors": errors,
        })),
        EditError::Locked(_) => HttpResponse::Forbidden().json(json!({ "message": e.to_string() })),
        EditError::Store(inner) => store_failure(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn precondition_failures_are_conflicts() {
        let period = YearMonth { year: 2025, month: 11 };
        assert_eq!(
            workflow_failure(&WorkflowError::PreviousMonthNotFinalized(period)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            workflow_failure(&WorkflowError::HrLocksIncomplete { locked: 1, total: 2 }).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn missing_fields_are_unprocessable() {
        let e = WorkflowError::MissingLockFields {
            employee_id: 1,
            missing_fields: vec!["IFSC Code".into()],
        };
        assert_eq!(workflow_failure(&e).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn backend_failures_hide_details() {
        let e = WorkflowError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(workflow_failure(&e).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            workflow_failure(&WorkflowError::CycleNotFound(9)).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn period_must_be_a_real_month() {
        assert!(parse_period(2025, 13).is_err());
        assert_eq!(parse_period(2025, 12).unwrap(), YearMonth { year: 2025, month: 12 });
    }
}
