//! Two-role, two-phase approval of a month's payroll.
//!
//! A cycle moves `pending → hr_signed → finalized`; an administrator may
//! revert either signed state back to pending. Each employee is locked by HR
//! and by Finance individually before the respective sign-off is allowed.
//! Reverting clears the sign-offs only, never the per-employee locks.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::model::audit::{AuditAction, AuditEntry};
use crate::model::employee::EmployeeWithPayroll;
use crate::model::payroll_cycle::{CycleStatus, PayrollCycle, Reversion, Signoff};
use crate::model::payroll_lock::{EmployeePayrollLock, LockEligibility, LockRole, LockStats};
use crate::model::payroll_report::{PayrollReport, ReportType};
use crate::payroll::dashboard::{DashboardStats, dashboard_stats};
use crate::payroll::month::YearMonth;
use crate::payroll::progression::{MonthProgression, month_accessible};
use crate::payroll::snapshot::build_snapshot;
use crate::payroll::store::{PayrollStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Payroll cycle {0} not found")]
    CycleNotFound(u64),

    #[error("Cannot create payroll for {0}: Previous month must be finalized first")]
    MonthNotAccessible(YearMonth),

    #[error("Cannot lock employee. Missing required fields: {}", .missing_fields.join(", "))]
    MissingLockFields { employee_id: u64, missing_fields: Vec<String> },

    #[error("Lock eligibility check is unavailable")]
    EligibilityUnavailable,

    #[error("Cannot sign off: Not all employees are locked by HR ({locked}/{total})")]
    HrLocksIncomplete { locked: i64, total: i64 },

    #[error("Cannot finalize: Previous month ({0}) must be finalized first")]
    PreviousMonthNotFinalized(YearMonth),

    #[error("Cannot sign off: Not all employees are locked by Finance ({locked}/{total})")]
    FinanceLocksIncomplete { locked: i64, total: i64 },

    #[error("Payroll for {0} is already finalized")]
    AlreadyFinalized(YearMonth),

    #[error("Payroll for {0} is already signed off by HR")]
    AlreadyHrSigned(YearMonth),

    #[error("Payroll for {0} has no sign-off to revert")]
    NothingToRevert(YearMonth),

    #[error("A reason is required to revert a payroll")]
    MissingReason,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub company_start: YearMonth,
    /// When the eligibility check is unavailable: `false` allows the lock,
    /// `true` refuses it.
    pub strict_eligibility_checks: bool,
}

/// Result of one employee within a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    Success,
    /// Refused by the eligibility check.
    Skipped,
    /// Backend write failed.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkTally {
    pub success: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl BulkTally {
    pub fn record(mut self, outcome: BulkOutcome) -> Self {
        match outcome {
            BulkOutcome::Success => self.success += 1,
            BulkOutcome::Skipped => self.skipped += 1,
            BulkOutcome::Failed => self.failed += 1,
        }
        self
    }

    fn all_failed(count: usize) -> Self {
        Self {
            failed: u32::try_from(count).unwrap_or(u32::MAX),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinanceSignoff {
    pub cycle: PayrollCycle,
    /// `None` when the snapshot could not be written; the sign-off still stands.
    pub snapshot: Option<PayrollReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RowSource {
    Live,
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct MonthRows {
    pub source: RowSource,
    pub rows: Vec<EmployeeWithPayroll>,
}

pub struct PayrollWorkflow<S> {
    store: S,
    settings: WorkflowSettings,
}

impl<S: PayrollStore> PayrollWorkflow<S> {
    pub fn new(store: S, settings: WorkflowSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full cycle history, reloaded on every call.
    pub async fn progression(&self) -> Result<MonthProgression, WorkflowError> {
        let cycles = self.store.list_cycles().await.map_err(|e| {
            error!(error = %e, "Failed to load payroll cycles");
            e
        })?;
        Ok(MonthProgression::new(self.settings.company_start, cycles))
    }

    pub async fn is_month_accessible(&self, period: YearMonth) -> Result<bool, WorkflowError> {
        let previous = self.store.find_cycle(period.prev()).await?;
        Ok(month_accessible(period, self.settings.company_start, previous.as_ref()))
    }

    /// The only place cycles are created. Refuses months whose predecessor
    /// is not finalized.
    #[instrument(skip(self))]
    pub async fn get_or_create_cycle(
        &self,
        period: YearMonth,
        actor: Option<u64>,
    ) -> Result<PayrollCycle, WorkflowError> {
        if let Some(existing) = self.store.find_cycle(period).await? {
            return Ok(existing);
        }

        if !self.is_month_accessible(period).await? {
            warn!(%period, "Refusing to open payroll cycle out of order");
            return Err(WorkflowError::MonthNotAccessible(period));
        }

        let cycle = match self.store.insert_cycle(period).await {
            Ok(cycle) => cycle,
            // Lost the insert race to a concurrent request; return its row.
            Err(StoreError::Duplicate(_)) => {
                debug!(%period, "Payroll cycle created concurrently");
                return self
                    .store
                    .find_cycle(period)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("payroll cycle {period}")).into());
            }
            Err(e) => {
                error!(error = %e, %period, "Failed to create payroll cycle");
                return Err(e.into());
            }
        };

        self.audit(
            AuditEntry::new(AuditAction::PayrollCreated, cycle.id, actor)
                .with_details(json!({ "month": period.month, "year": period.year })),
        )
        .await;

        info!(cycle_id = cycle.id, %period, "Payroll cycle created");
        Ok(cycle)
    }

    pub async fn require_cycle(&self, cycle_id: u64) -> Result<PayrollCycle, WorkflowError> {
        self.store
            .find_cycle_by_id(cycle_id)
            .await?
            .ok_or(WorkflowError::CycleNotFound(cycle_id))
    }

    /// Live counts, or counts frozen at the snapshot for a finalized month.
    pub async fn lock_stats(&self, cycle_id: u64) -> Result<LockStats, WorkflowError> {
        let cycle = self.require_cycle(cycle_id).await?;
        if cycle.is_finalized() {
            if let Some(snapshot) = self.store.find_report(cycle.period, ReportType::Snapshot).await? {
                return Ok(LockStats::frozen(snapshot.total_employees));
            }
        }
        Ok(self.store.lock_stats(cycle_id).await?)
    }

    pub async fn list_locks(&self, cycle_id: u64) -> Result<Vec<EmployeePayrollLock>, WorkflowError> {
        self.require_cycle(cycle_id).await?;
        Ok(self.store.list_locks(cycle_id).await?)
    }

    /// Eligibility with the unavailable-check policy applied.
    async fn eligibility(
        &self,
        role: LockRole,
        employee_id: u64,
        cycle_id: u64,
    ) -> Result<LockEligibility, WorkflowError> {
        match self.store.check_lock_eligibility(role, employee_id, cycle_id).await {
            Ok(eligibility) => Ok(eligibility),
            Err(StoreError::Unavailable(check)) if !self.settings.strict_eligibility_checks => {
                warn!(%role, employee_id, check = %check, "Eligibility check unavailable, allowing lock");
                Ok(LockEligibility::allowed())
            }
            Err(StoreError::Unavailable(check)) => {
                warn!(%role, employee_id, check = %check, "Eligibility check unavailable, refusing lock");
                Err(WorkflowError::EligibilityUnavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the lock row on first lock, updates it in place afterwards.
    /// Unlocking a pair that was never locked writes nothing.
    async fn apply_lock(
        &self,
        role: LockRole,
        employee_id: u64,
        cycle_id: u64,
        lock: bool,
        actor: Option<u64>,
    ) -> Result<Option<EmployeePayrollLock>, StoreError> {
        let now = Utc::now();
        match self.store.find_lock(employee_id, cycle_id).await? {
            Some(mut row) => {
                row.set_locked(role, lock, actor, now);
                self.store.update_lock(&row).await?;
                Ok(Some(row))
            }
            None if lock => {
                let mut row = EmployeePayrollLock::new(employee_id, cycle_id);
                row.set_locked(role, true, actor, now);
                row.id = self.store.insert_lock(&row).await?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Locks and unlocks may only change while the month is still open.
    async fn require_open_cycle(&self, cycle_id: u64) -> Result<PayrollCycle, WorkflowError> {
        let cycle = self.require_cycle(cycle_id).await?;
        if cycle.is_finalized() {
            return Err(WorkflowError::AlreadyFinalized(cycle.period));
        }
        Ok(cycle)
    }

    #[instrument(skip(self))]
    pub async fn toggle_lock(
        &self,
        role: LockRole,
        employee_id: u64,
        cycle_id: u64,
        currently_locked: bool,
        actor: Option<u64>,
    ) -> Result<Option<EmployeePayrollLock>, WorkflowError> {
        self.require_open_cycle(cycle_id).await?;
        let lock = !currently_locked;

        if lock {
            let eligibility = self.eligibility(role, employee_id, cycle_id).await?;
            if !eligibility.can_lock {
                warn!(missing = ?eligibility.missing_fields, "Lock refused, required fields missing");
                return Err(WorkflowError::MissingLockFields {
                    employee_id,
                    missing_fields: eligibility.missing_fields,
                });
            }
        }

        let row = self
            .apply_lock(role, employee_id, cycle_id, lock, actor)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to write employee lock");
                e
            })?;

        self.audit(AuditEntry::new(AuditAction::lock(role, lock), cycle_id, actor).for_employee(employee_id))
            .await;

        info!(locked = lock, "Employee lock updated");
        Ok(row)
    }

    async fn bulk_lock_one(
        &self,
        role: LockRole,
        cycle_id: u64,
        employee_id: u64,
        lock: bool,
        actor: Option<u64>,
    ) -> BulkOutcome {
        if lock {
            match self.eligibility(role, employee_id, cycle_id).await {
                Ok(eligibility) if eligibility.can_lock => {}
                Ok(_) | Err(WorkflowError::EligibilityUnavailable) => return BulkOutcome::Skipped,
                Err(e) => {
                    error!(error = %e, employee_id, "Eligibility check failed");
                    return BulkOutcome::Failed;
                }
            }
        }

        match self.apply_lock(role, employee_id, cycle_id, lock, actor).await {
            Ok(_) => BulkOutcome::Success,
            Err(e) => {
                error!(error = %e, employee_id, "Failed to write employee lock");
                BulkOutcome::Failed
            }
        }
    }

    /// Applies the same lock change to every id, one at a time, and reports
    /// each outcome. One employee's failure never stops the batch.
    #[instrument(skip(self, employee_ids), fields(count = employee_ids.len()))]
    pub async fn bulk_lock(
        &self,
        role: LockRole,
        cycle_id: u64,
        employee_ids: &[u64],
        lock: bool,
        actor: Option<u64>,
    ) -> BulkTally {
        if let Err(e) = self.require_open_cycle(cycle_id).await {
            error!(error = %e, "Bulk lock refused");
            return BulkTally::all_failed(employee_ids.len());
        }

        let tally = stream::iter(employee_ids.iter().copied())
            .fold(BulkTally::default(), |tally, employee_id| async move {
                tally.record(self.bulk_lock_one(role, cycle_id, employee_id, lock, actor).await)
            })
            .await;

        self.audit(
            AuditEntry::new(AuditAction::bulk_lock(role, lock), cycle_id, actor).with_details(json!({
                "total": employee_ids.len(),
                "success": tally.success,
                "failed": tally.failed,
                "skipped": tally.skipped,
            })),
        )
        .await;

        info!(success = tally.success, skipped = tally.skipped, failed = tally.failed, "Bulk lock finished");
        tally
    }

    #[instrument(skip(self))]
    pub async fn hr_signoff(&self, cycle_id: u64, actor: Option<u64>) -> Result<PayrollCycle, WorkflowError> {
        let cycle = self.require_open_cycle(cycle_id).await?;
        if cycle.status.hr_signoff().is_some() {
            warn!(period = %cycle.period, "HR sign-off refused, already signed");
            return Err(WorkflowError::AlreadyHrSigned(cycle.period));
        }

        let stats = self.store.lock_stats(cycle_id).await?;
        if !stats.can_hr_signoff {
            warn!(locked = stats.hr_locked_count, total = stats.total_employees, "HR sign-off refused");
            return Err(WorkflowError::HrLocksIncomplete {
                locked: stats.hr_locked_count,
                total: stats.total_employees,
            });
        }

        let signed = PayrollCycle {
            status: cycle.status.with_hr_signoff(Signoff { by: actor, at: Utc::now() }),
            ..cycle
        };
        self.store.update_cycle(&signed).await.map_err(|e| {
            error!(error = %e, "Failed to record HR sign-off");
            e
        })?;

        self.audit(AuditEntry::new(AuditAction::HrSignoff, cycle_id, actor)).await;
        info!(period = %signed.period, "HR signed off payroll");
        Ok(signed)
    }

    /// Terminal action for a month. Independent of the HR sign-off: only the
    /// predecessor month and the Finance lock count are checked.
    #[instrument(skip(self))]
    pub async fn finance_signoff(&self, cycle_id: u64, actor: Option<u64>) -> Result<FinanceSignoff, WorkflowError> {
        let cycle = self.require_open_cycle(cycle_id).await?;

        let previous = self.store.find_cycle(cycle.period.prev()).await?;
        if !month_accessible(cycle.period, self.settings.company_start, previous.as_ref()) {
            warn!(period = %cycle.period, "Finance sign-off refused, previous month open");
            return Err(WorkflowError::PreviousMonthNotFinalized(cycle.period.prev()));
        }

        let stats = self.store.lock_stats(cycle_id).await?;
        if !stats.can_finance_signoff {
            warn!(
                locked = stats.finance_locked_count,
                total = stats.total_employees,
                "Finance sign-off refused"
            );
            return Err(WorkflowError::FinanceLocksIncomplete {
                locked: stats.finance_locked_count,
                total: stats.total_employees,
            });
        }

        let finalized = PayrollCycle {
            status: cycle.status.with_finance_signoff(Signoff { by: actor, at: Utc::now() }),
            ..cycle
        };
        self.store.update_cycle(&finalized).await.map_err(|e| {
            error!(error = %e, "Failed to record Finance sign-off");
            e
        })?;

        self.audit(
            AuditEntry::new(AuditAction::PayrollFinalized, cycle_id, actor).with_details(json!({
                "month": finalized.period.month,
                "year": finalized.period.year,
            })),
        )
        .await;
        info!(period = %finalized.period, "Payroll finalized");

        let snapshot = match self.write_snapshot(finalized.period, actor).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, period = %finalized.period, "Snapshot generation failed");
                None
            }
        };

        Ok(FinanceSignoff {
            cycle: finalized,
            snapshot,
        })
    }

    async fn write_snapshot(&self, period: YearMonth, actor: Option<u64>) -> Result<PayrollReport, StoreError> {
        let rows = self.store.list_employees_with_payroll(period).await?;
        let report = build_snapshot(period, rows, actor, Utc::now());
        self.store.upsert_report(&report).await?;
        info!(%period, employees = report.total_employees, "Payroll snapshot stored");
        Ok(report)
    }

    /// Administrative rollback to pending. Lock rows are left exactly as they are.
    #[instrument(skip(self, reason))]
    pub async fn revert_payroll(
        &self,
        cycle_id: u64,
        reason: &str,
        actor: Option<u64>,
    ) -> Result<PayrollCycle, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::MissingReason);
        }

        let cycle = self.require_cycle(cycle_id).await?;
        if cycle.status == CycleStatus::Pending {
            return Err(WorkflowError::NothingToRevert(cycle.period));
        }

        let reverted = PayrollCycle {
            status: CycleStatus::Pending,
            reversion: Some(Reversion {
                by: actor,
                at: Utc::now(),
                reason: reason.to_string(),
            }),
            ..cycle
        };
        self.store.update_cycle(&reverted).await.map_err(|e| {
            error!(error = %e, "Failed to revert payroll");
            e
        })?;

        self.audit(
            AuditEntry::new(AuditAction::PayrollReverted, cycle_id, actor).with_details(json!({ "reason": reason })),
        )
        .await;
        warn!(period = %reverted.period, reason, "Payroll reverted to pending");
        Ok(reverted)
    }

    /// Rows a month is viewed through: the frozen snapshot once finalized,
    /// live tables otherwise.
    pub async fn month_rows(&self, period: YearMonth) -> Result<MonthRows, WorkflowError> {
        let finalized = self
            .store
            .find_cycle(period)
            .await?
            .is_some_and(|c| c.is_finalized());

        if finalized {
            match self.store.find_report(period, ReportType::Snapshot).await? {
                Some(report) => {
                    return Ok(MonthRows {
                        source: RowSource::Snapshot,
                        rows: report.report_data,
                    });
                }
                None => warn!(%period, "Finalized payroll has no snapshot, showing live rows"),
            }
        }

        Ok(MonthRows {
            source: RowSource::Live,
            rows: self.store.list_employees_with_payroll(period).await?,
        })
    }

    pub async fn dashboard(&self, period: YearMonth) -> Result<DashboardStats, WorkflowError> {
        let rows = self.month_rows(period).await?.rows;
        let locks = match self.store.find_cycle(period).await? {
            Some(cycle) => self.store.list_locks(cycle.id).await?,
            None => Vec::new(),
        };
        Ok(dashboard_stats(&rows, &locks))
    }

    /// Audit writes never fail the action they describe.
    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(error = %e, action = %entry.action, "Failed to append payroll audit entry");
        }
    }
}
