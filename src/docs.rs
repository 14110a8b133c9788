use crate::api::cycles::{CreateCycle, CycleListResponse};
use crate::api::employees::{CreateEmployee, PayrollRowsResponse, SetActive, UploadFailure, UploadTally};
use crate::api::locks::{BulkLockRequest, ToggleLockRequest};
use crate::api::reports::{DashboardResponse, PayrollReportDetail};
use crate::api::signoff::RevertRequest;
use crate::api::workspace::{FieldEdit, GotoRequest, WorkspaceResponse};
use crate::model::employee::Employee;
use crate::model::monthly_payroll::MonthlyPayroll;
use crate::model::payroll_cycle::{PayrollCycleResponse, StatusKind};
use crate::model::payroll_lock::{EmployeePayrollLock, LockEligibility, LockRole, LockStats};
use crate::model::payroll_report::{PayrollReportSummary, ReportType};
use crate::payroll::dashboard::DashboardStats;
use crate::payroll::edit_buffer::{FieldTarget, RowEdits, RowFailure, SaveAllTally, SaveOutcome};
use crate::payroll::filter::ActiveFilter;
use crate::payroll::month::YearMonth;
use crate::payroll::progression::NavigationState;
use crate::payroll::workflow::{BulkTally, RowSource};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Payroll API",
        version = "1.0.0",
        description = r#"
## Monthly Payroll Workflow

Employees are entered or uploaded, monthly payroll fields are edited by **HR** and **Finance**,
and each month moves through a lock / sign-off / finalize workflow before it is frozen into a snapshot report.

### Month progression
- Only one month is open at a time: the month after the latest finalized one
- A month can be opened only once the previous month is finalized
- Finalized months are read from their snapshot, never from live rows

### Locks and sign-off
- HR locks every active employee, then signs off
- Finance locks every active employee, then finalizes the month
- An administrator may revert a signed month back to pending; locks are kept

### Security
Every endpoint requires a **JWT Bearer** token. Role gates: HR actions for HR/Admin,
Finance actions for Finance/Admin, reverts for Admin only.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::cycles::list_cycles,
        crate::api::cycles::get_or_create_cycle,
        crate::api::cycles::cycle_stats,

        crate::api::locks::list_locks,
        crate::api::locks::toggle_lock,
        crate::api::locks::bulk_lock,

        crate::api::signoff::hr_signoff,
        crate::api::signoff::finance_signoff,
        crate::api::signoff::revert_payroll,

        crate::api::workspace::get_workspace,
        crate::api::workspace::reset_workspace,
        crate::api::workspace::go_next,
        crate::api::workspace::go_prev,
        crate::api::workspace::go_to_active,
        crate::api::workspace::go_to_month,
        crate::api::workspace::update_field,
        crate::api::workspace::cancel_row,
        crate::api::workspace::save_row,
        crate::api::workspace::save_all,

        crate::api::employees::list_payroll_rows,
        crate::api::employees::create_employee,
        crate::api::employees::bulk_create_employees,
        crate::api::employees::set_employee_active,

        crate::api::reports::list_reports,
        crate::api::reports::get_report,
        crate::api::reports::dashboard
    ),
    components(
        schemas(
            YearMonth,
            StatusKind,
            PayrollCycleResponse,
            CreateCycle,
            CycleListResponse,
            LockRole,
            LockStats,
            LockEligibility,
            EmployeePayrollLock,
            ToggleLockRequest,
            BulkLockRequest,
            BulkTally,
            RevertRequest,
            NavigationState,
            WorkspaceResponse,
            GotoRequest,
            FieldEdit,
            FieldTarget,
            RowEdits,
            SaveOutcome,
            RowFailure,
            SaveAllTally,
            Employee,
            MonthlyPayroll,
            CreateEmployee,
            SetActive,
            UploadFailure,
            UploadTally,
            ActiveFilter,
            RowSource,
            PayrollRowsResponse,
            ReportType,
            PayrollReportSummary,
            PayrollReportDetail,
            DashboardStats,
            DashboardResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Payroll Cycles", description = "Month progression and cycle APIs"),
        (name = "Payroll Locks", description = "Per-employee HR and Finance locks"),
        (name = "Payroll Sign-off", description = "HR sign-off, Finance finalization and reverts"),
        (name = "Payroll Workspace", description = "Month navigation and pending row edits"),
        (name = "Employees", description = "Employee entry and payroll rows"),
        (name = "Payroll Reports", description = "Snapshots and dashboard"),
    )
)]
pub struct ApiDoc;
