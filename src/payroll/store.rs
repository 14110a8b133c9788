use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::audit::AuditEntry;
use crate::model::employee::{Employee, EmployeeWithPayroll};
use crate::model::monthly_payroll::MonthlyPayroll;
use crate::model::payroll_cycle::PayrollCycle;
use crate::model::payroll_lock::{EmployeePayrollLock, LockEligibility, LockRole, LockStats};
use crate::model::payroll_report::{PayrollReport, ReportType};
use crate::payroll::month::YearMonth;

/// Partial row overlay: column name to new value.
pub type FieldMap = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backing check (table, procedure) does not exist on this deployment.
    #[error("{0} is not available")]
    Unavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("invalid stored data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored value: {0}")]
    InvalidRow(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Payroll side of a row save.
#[derive(Debug, Clone, PartialEq)]
pub enum PayrollWrite {
    Unchanged,
    Update { payroll_id: u64, fields: FieldMap },
    Insert(MonthlyPayroll),
}

/// Everything the payroll workflow reads from or writes to the backend.
///
/// Cycles are keyed by (month, year), locks by (employee, cycle), reports by
/// (month, year, report_type).
#[async_trait]
pub trait PayrollStore: Send + Sync + 'static {
    /// All cycles, oldest first.
    async fn list_cycles(&self) -> StoreResult<Vec<PayrollCycle>>;

    async fn find_cycle(&self, period: YearMonth) -> StoreResult<Option<PayrollCycle>>;

    async fn find_cycle_by_id(&self, cycle_id: u64) -> StoreResult<Option<PayrollCycle>>;

    /// Inserts a pending cycle with every sign-off field empty. Fails with
    /// [`StoreError::Duplicate`] when the month already has a cycle.
    async fn insert_cycle(&self, period: YearMonth) -> StoreResult<PayrollCycle>;

    /// Writes status, sign-off and reversion columns of an existing cycle.
    async fn update_cycle(&self, cycle: &PayrollCycle) -> StoreResult<()>;

    async fn find_lock(&self, employee_id: u64, cycle_id: u64) -> StoreResult<Option<EmployeePayrollLock>>;

    async fn list_locks(&self, cycle_id: u64) -> StoreResult<Vec<EmployeePayrollLock>>;

    /// Returns the new row id.
    async fn insert_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<u64>;

    async fn update_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<()>;

    async fn check_lock_eligibility(
        &self,
        role: LockRole,
        employee_id: u64,
        cycle_id: u64,
    ) -> StoreResult<LockEligibility>;

    async fn lock_stats(&self, cycle_id: u64) -> StoreResult<LockStats>;

    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Inserts or replaces the report with the same (month, year, report_type).
    async fn upsert_report(&self, report: &PayrollReport) -> StoreResult<()>;

    async fn find_report(&self, period: YearMonth, report_type: ReportType) -> StoreResult<Option<PayrollReport>>;

    /// Newest first.
    async fn list_reports(&self) -> StoreResult<Vec<PayrollReport>>;

    /// Every employee (active or not) with its payroll row for `period`,
    /// ordered by employee code.
    async fn list_employees_with_payroll(&self, period: YearMonth) -> StoreResult<Vec<EmployeeWithPayroll>>;

    async fn insert_employee(&self, employee: &Employee) -> StoreResult<u64>;

    async fn set_employee_active(&self, employee_id: u64, is_active: bool) -> StoreResult<()>;

    /// Writes one row's employee columns and its payroll change together:
    /// either both are stored or neither is.
    async fn save_row_fields(
        &self,
        employee_id: u64,
        employee: &FieldMap,
        payroll: &PayrollWrite,
    ) -> StoreResult<()>;
}
