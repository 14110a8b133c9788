use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

use crate::model::payroll_lock::LockRole;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    PayrollCreated,
    HrSignoff,
    PayrollFinalized,
    HrLock,
    HrUnlock,
    FinanceLock,
    FinanceUnlock,
    BulkHrLock,
    BulkHrUnlock,
    BulkFinanceLock,
    BulkFinanceUnlock,
    PayrollReverted,
}

impl AuditAction {
    pub fn lock(role: LockRole, locked: bool) -> Self {
        match (role, locked) {
            (LockRole::Hr, true) => AuditAction::HrLock,
            (LockRole::Hr, false) => AuditAction::HrUnlock,
            (LockRole::Finance, true) => AuditAction::FinanceLock,
            (LockRole::Finance, false) => AuditAction::FinanceUnlock,
        }
    }

    pub fn bulk_lock(role: LockRole, locked: bool) -> Self {
        match (role, locked) {
            (LockRole::Hr, true) => AuditAction::BulkHrLock,
            (LockRole::Hr, false) => AuditAction::BulkHrUnlock,
            (LockRole::Finance, true) => AuditAction::BulkFinanceLock,
            (LockRole::Finance, false) => AuditAction::BulkFinanceUnlock,
        }
    }
}

/// Append-only record of a workflow action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub cycle_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub action: AuditAction,
    pub performed_by: Option<u64>,
    pub performed_at: DateTime<Utc>,
    pub details: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, cycle_id: u64, performed_by: Option<u64>) -> Self {
        Self {
            cycle_id: Some(cycle_id),
            employee_id: None,
            action,
            performed_by,
            performed_at: Utc::now(),
            details: None,
        }
    }

    pub fn for_employee(mut self, employee_id: u64) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
