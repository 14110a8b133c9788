use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockRole {
    Hr,
    Finance,
}

/// One row per (employee, cycle). Unlocking clears the flag and actor fields
/// but keeps the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeePayrollLock {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub cycle_id: u64,
    pub hr_locked: bool,
    pub hr_locked_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub hr_locked_at: Option<DateTime<Utc>>,
    pub finance_locked: bool,
    pub finance_locked_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub finance_locked_at: Option<DateTime<Utc>>,
}

impl EmployeePayrollLock {
    /// Unpersisted, fully unlocked row.
    pub fn new(employee_id: u64, cycle_id: u64) -> Self {
        Self {
            id: 0,
            employee_id,
            cycle_id,
            hr_locked: false,
            hr_locked_by: None,
            hr_locked_at: None,
            finance_locked: false,
            finance_locked_by: None,
            finance_locked_at: None,
        }
    }

    pub fn is_locked(&self, role: LockRole) -> bool {
        match role {
            LockRole::Hr => self.hr_locked,
            LockRole::Finance => self.finance_locked,
        }
    }

    pub fn set_locked(&mut self, role: LockRole, locked: bool, actor: Option<u64>, now: DateTime<Utc>) {
        let (by, at) = if locked { (actor, Some(now)) } else { (None, None) };
        match role {
            LockRole::Hr => {
                self.hr_locked = locked;
                self.hr_locked_by = by;
                self.hr_locked_at = at;
            }
            LockRole::Finance => {
                self.finance_locked = locked;
                self.finance_locked_by = by;
                self.finance_locked_at = at;
            }
        }
    }
}

/// Aggregate lock progress of a cycle over active employees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LockStats {
    #[schema(example = 240)]
    pub total_employees: i64,
    #[schema(example = 240)]
    pub hr_locked_count: i64,
    #[schema(example = 120)]
    pub finance_locked_count: i64,
    pub can_hr_signoff: bool,
    pub can_finance_signoff: bool,
}

impl LockStats {
    pub fn from_counts(total_employees: i64, hr_locked_count: i64, finance_locked_count: i64) -> Self {
        Self {
            total_employees,
            hr_locked_count,
            finance_locked_count,
            can_hr_signoff: total_employees > 0 && hr_locked_count == total_employees,
            can_finance_signoff: total_employees > 0 && finance_locked_count == total_employees,
        }
    }

    /// Stats of a finalized month, pinned to the snapshot's head count.
    pub fn frozen(total_employees: i64) -> Self {
        Self::from_counts(total_employees, total_employees, total_employees)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LockEligibility {
    pub can_lock: bool,
    #[schema(example = json!(["Bank Account Number"]))]
    pub missing_fields: Vec<String>,
}

impl LockEligibility {
    pub fn allowed() -> Self {
        Self {
            can_lock: true,
            missing_fields: Vec::new(),
        }
    }

    pub fn missing(missing_fields: Vec<String>) -> Self {
        Self {
            can_lock: missing_fields.is_empty(),
            missing_fields,
        }
    }
}

/// A field that must be filled before an employee may be locked.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollLockRequirement {
    #[schema(example = "bank_account_number")]
    pub field_name: String,
    #[schema(example = "Bank Account Number")]
    pub display_name: String,
    pub required_for_hr_lock: bool,
    pub required_for_finance_lock: bool,
}

impl PayrollLockRequirement {
    pub fn required_for(&self, role: LockRole) -> bool {
        match role {
            LockRole::Hr => self.required_for_hr_lock,
            LockRole::Finance => self.required_for_finance_lock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocking_clears_actor_and_timestamp() {
        let mut lock = EmployeePayrollLock::new(1, 2);
        lock.set_locked(LockRole::Finance, true, Some(9), Utc::now());
        assert!(lock.finance_locked);
        assert_eq!(lock.finance_locked_by, Some(9));

        lock.set_locked(LockRole::Finance, false, Some(9), Utc::now());
        assert!(!lock.finance_locked);
        assert_eq!(lock.finance_locked_by, None);
        assert_eq!(lock.finance_locked_at, None);
        assert!(!lock.hr_locked);
    }

    #[test]
    fn signoff_flags_require_complete_non_empty_counts() {
        let stats = LockStats::from_counts(3, 3, 2);
        assert!(stats.can_hr_signoff);
        assert!(!stats.can_finance_signoff);

        let empty = LockStats::from_counts(0, 0, 0);
        assert!(!empty.can_hr_signoff);
        assert!(!empty.can_finance_signoff);
    }

    #[test]
    fn parses_role_from_path_segment() {
        assert_eq!("hr".parse::<LockRole>().unwrap(), LockRole::Hr);
        assert_eq!("finance".parse::<LockRole>().unwrap(), LockRole::Finance);
        assert!("admin".parse::<LockRole>().is_err());
    }
}
