//! Pending per-row edits layered over persisted employee and payroll rows.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::model::employee::{EDITABLE_EMPLOYEE_FIELDS, EmployeeWithPayroll};
use crate::model::monthly_payroll::{EDITABLE_PAYROLL_FIELDS, MonthlyPayroll};
use crate::model::payroll_cycle::StatusKind;
use crate::model::payroll_lock::{EmployeePayrollLock, LockRole};
use crate::model::role::Role;
use crate::payroll::month::YearMonth;
use crate::payroll::store::{FieldMap, PayrollStore, PayrollWrite, StoreError};
use crate::payroll::validation::{RowValidationErrors, validate_type_amounts};

/// Columns stored as numbers; the grid may submit them as strings.
const NUMERIC_FIELDS: &[&str] = &[
    "current_salary",
    "employee_salary",
    "deduction_amount",
    "addition_amount",
    "incentive_amount",
    "pf_amount",
    "esi_amount",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldTarget {
    Employee,
    Payroll,
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("{0} is not an editable field")]
    UnknownField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cannot save: {}", .0.messages().join("; "))]
    Invalid(RowValidationErrors),

    #[error("Employee {0} cannot be edited in the current payroll state")]
    Locked(u64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pending edits of one row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RowEdits {
    #[schema(value_type = Object)]
    pub employee: FieldMap,
    #[schema(value_type = Object)]
    pub payroll: FieldMap,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    NoChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RowFailure {
    pub employee_id: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SaveAllTally {
    pub saved: u32,
    pub failed: u32,
    pub failures: Vec<RowFailure>,
}

/// Who may edit which row of the month being viewed.
#[derive(Debug, Clone)]
pub struct EditGuard {
    role: Role,
    status: StatusKind,
    locks: HashMap<u64, EmployeePayrollLock>,
}

impl EditGuard {
    pub fn new(role: Role, status: StatusKind, locks: Vec<EmployeePayrollLock>) -> Self {
        Self {
            role,
            status,
            locks: locks.into_iter().map(|l| (l.employee_id, l)).collect(),
        }
    }

    pub fn can_edit(&self, employee_id: u64) -> bool {
        if self.status == StatusKind::Finalized {
            return false;
        }
        let lock = self.locks.get(&employee_id);
        match self.role {
            Role::Admin => true,
            Role::Hr => self.status != StatusKind::HrSigned && !lock.is_some_and(|l| l.is_locked(LockRole::Hr)),
            Role::Finance => !lock.is_some_and(|l| l.is_locked(LockRole::Finance)),
        }
    }
}

const DATE_FIELDS: &[&str] = &["joining_date", "end_date"];

fn normalize_date(field: &str, value: Value) -> Result<Value, EditError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(|d| json!(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| EditError::InvalidValue {
                field: field.to_string(),
                reason: format!("{s:?} is not a YYYY-MM-DD date"),
            }),
        other => Err(EditError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a date, got {other}"),
        }),
    }
}

fn normalize(field: &str, value: Value) -> Result<Value, EditError> {
    if DATE_FIELDS.contains(&field) {
        return normalize_date(field, value);
    }
    if !NUMERIC_FIELDS.contains(&field) {
        return Ok(value);
    }
    match value {
        Value::Number(_) => Ok(value),
        Value::Null => Ok(json!(0.0)),
        Value::String(s) if s.trim().is_empty() => Ok(json!(0.0)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|n| json!(n))
            .map_err(|_| EditError::InvalidValue {
                field: field.to_string(),
                reason: format!("{s:?} is not a number"),
            }),
        other => Err(EditError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a number, got {other}"),
        }),
    }
}

fn persisted_value(row: &EmployeeWithPayroll, field: &str, target: FieldTarget) -> Option<Value> {
    let value = match target {
        FieldTarget::Employee => serde_json::to_value(&row.employee).ok()?,
        FieldTarget::Payroll => serde_json::to_value(row.payroll.as_ref()?).ok()?,
    };
    value.get(field).cloned()
}

fn overlay(base: &MonthlyPayroll, fields: &FieldMap) -> Result<MonthlyPayroll, EditError> {
    let mut value = serde_json::to_value(base).map_err(StoreError::from)?;
    if let Some(object) = value.as_object_mut() {
        object.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    serde_json::from_value(value).map_err(|e| EditError::InvalidValue {
        field: "payroll".to_string(),
        reason: e.to_string(),
    })
}

/// Pending edits of one user, keyed by employee id.
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    rows: BTreeMap<u64, RowEdits>,
}

impl EditBuffer {
    pub fn update_field(
        &mut self,
        employee_id: u64,
        field: &str,
        value: Value,
        target: FieldTarget,
    ) -> Result<(), EditError> {
        let allowed = match target {
            FieldTarget::Employee => EDITABLE_EMPLOYEE_FIELDS,
            FieldTarget::Payroll => EDITABLE_PAYROLL_FIELDS,
        };
        if !allowed.contains(&field) {
            return Err(EditError::UnknownField(field.to_string()));
        }
        let value = normalize(field, value)?;

        let row = self.rows.entry(employee_id).or_default();
        match target {
            FieldTarget::Employee => row.employee.insert(field.to_string(), value),
            FieldTarget::Payroll => row.payroll.insert(field.to_string(), value),
        };
        row.dirty = true;
        Ok(())
    }

    pub fn row(&self, employee_id: u64) -> Option<&RowEdits> {
        self.rows.get(&employee_id)
    }

    pub fn rows(&self) -> &BTreeMap<u64, RowEdits> {
        &self.rows
    }

    pub fn is_dirty(&self, employee_id: u64) -> bool {
        self.rows.get(&employee_id).is_some_and(|r| r.dirty)
    }

    pub fn dirty_ids(&self) -> Vec<u64> {
        self.rows.keys().copied().filter(|id| self.is_dirty(*id)).collect()
    }

    /// Drops a row's pending edits. Returns whether there were any.
    pub fn cancel(&mut self, employee_id: u64) -> bool {
        self.rows.remove(&employee_id).is_some()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Pending value when the row is dirty, persisted value otherwise.
    pub fn display_value(&self, row: &EmployeeWithPayroll, field: &str, target: FieldTarget) -> Option<Value> {
        let pending = self
            .rows
            .get(&row.employee.id)
            .filter(|r| r.dirty)
            .and_then(|r| match target {
                FieldTarget::Employee => r.employee.get(field),
                FieldTarget::Payroll => r.payroll.get(field),
            });
        match pending {
            Some(value) => Some(value.clone()),
            None => persisted_value(row, field, target),
        }
    }

    pub fn validate(&self, row: &EmployeeWithPayroll) -> RowValidationErrors {
        validate_type_amounts(|field| self.display_value(row, field, FieldTarget::Payroll))
    }

    /// Writes one row's pending edits as a single store call. On any failure
    /// nothing is written and the pending edits stay in the buffer.
    pub async fn save_row<S: PayrollStore>(
        &mut self,
        store: &S,
        row: &EmployeeWithPayroll,
        period: YearMonth,
        guard: &EditGuard,
    ) -> Result<SaveOutcome, EditError> {
        let employee_id = row.employee.id;
        let Some(edits) = self.rows.get(&employee_id).filter(|r| r.dirty).cloned() else {
            return Ok(SaveOutcome::NoChanges);
        };

        if !guard.can_edit(employee_id) {
            return Err(EditError::Locked(employee_id));
        }

        let errors = self.validate(row);
        if !errors.is_empty() {
            return Err(EditError::Invalid(errors));
        }

        let payroll = match &row.payroll {
            Some(existing) if !edits.payroll.is_empty() => {
                let merged = overlay(existing, &edits.payroll)?;
                let mut fields = edits.payroll.clone();
                fields.insert("net_pay".to_string(), json!(merged.compute_net_pay()));
                PayrollWrite::Update {
                    payroll_id: existing.id,
                    fields,
                }
            }
            None if !edits.payroll.is_empty() => {
                let mut record = overlay(&MonthlyPayroll::defaults(employee_id, period), &edits.payroll)?;
                record.net_pay = record.compute_net_pay();
                PayrollWrite::Insert(record)
            }
            _ => PayrollWrite::Unchanged,
        };

        store.save_row_fields(employee_id, &edits.employee, &payroll).await?;

        self.rows.remove(&employee_id);
        info!(employee_id, %period, "Row edits saved");
        Ok(SaveOutcome::Saved)
    }

    /// Saves every dirty row one after another. Rows that fail validation or
    /// the write are counted as failed and keep their edits.
    pub async fn save_all<S: PayrollStore>(
        &mut self,
        store: &S,
        rows: &[EmployeeWithPayroll],
        period: YearMonth,
        guard: &EditGuard,
    ) -> SaveAllTally {
        let mut tally = SaveAllTally::default();

        for employee_id in self.dirty_ids() {
            let Some(row) = rows.iter().find(|r| r.employee.id == employee_id) else {
                warn!(employee_id, "Pending edits for an employee not in view, left in buffer");
                continue;
            };

            match self.save_row(store, row, period, guard).await {
                Ok(_) => tally.saved += 1,
                Err(e) => {
                    match &e {
                        EditError::Store(_) => error!(error = %e, employee_id, "Failed to save row"),
                        _ => warn!(error = %e, employee_id, "Row not saved"),
                    }
                    tally.failed += 1;
                    tally.failures.push(RowFailure {
                        employee_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(saved = tally.saved, failed = tally.failed, %period, "Save all finished");
        tally
    }
}
