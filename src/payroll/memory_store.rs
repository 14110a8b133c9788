//! In-process [`PayrollStore`] with failure injection, for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::audit::{AuditAction, AuditEntry};
use crate::model::employee::{Employee, EmployeeWithPayroll};
use crate::model::monthly_payroll::MonthlyPayroll;
use crate::model::payroll_cycle::{CycleStatus, PayrollCycle};
use crate::model::payroll_lock::{EmployeePayrollLock, LockEligibility, LockRole, LockStats};
use crate::model::payroll_report::{PayrollReport, ReportType};
use crate::payroll::month::YearMonth;
use crate::payroll::store::{FieldMap, PayrollStore, PayrollWrite, StoreError, StoreResult};

#[derive(Default)]
struct State {
    next_id: u64,
    cycles: Vec<PayrollCycle>,
    locks: Vec<EmployeePayrollLock>,
    employees: Vec<Employee>,
    payrolls: Vec<MonthlyPayroll>,
    reports: Vec<PayrollReport>,
    audit: Vec<AuditEntry>,
    cycle_inserts: usize,
    payroll_writes: usize,
    ineligible: HashMap<(LockRole, u64), Vec<String>>,
    failing_lock_writes: HashSet<u64>,
    failing_employee_writes: HashSet<u64>,
    failing_payroll_writes: HashSet<u64>,
    hidden_cycles: HashSet<YearMonth>,
    eligibility_unavailable: bool,
    failing_audit: bool,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

pub fn employee(id: u64, code: &str) -> Employee {
    Employee {
        id,
        employee_code: code.to_string(),
        employee_name: format!("Employee {code}"),
        employment_status: "Employed".to_string(),
        pf_applicable: "No".to_string(),
        esi_applicable: "No".to_string(),
        designation: Some("Analyst".to_string()),
        department: Some("Finance".to_string()),
        joining_date: None,
        end_date: None,
        current_salary: 40000.0,
        bank_account_number: Some("000111222".to_string()),
        bank_name: Some("SBI".to_string()),
        bank_ifsc_code: Some("SBIN0000001".to_string()),
        payment_mode: "INR Account".to_string(),
        is_active: true,
    }
}

fn merge<T: Serialize + DeserializeOwned>(current: &T, fields: &FieldMap) -> StoreResult<T> {
    let mut value = serde_json::to_value(current)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidUpdate("row is not an object".into()))?;
    for (k, v) in fields {
        object.insert(k.clone(), v.clone());
    }
    serde_json::from_value(value).map_err(|e| StoreError::InvalidUpdate(e.to_string()))
}

fn db_failure(what: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(format!("injected failure: {what}")))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `n` active employees with ids `1..=n`.
    pub fn with_employees(n: u64) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for id in 1..=n {
                state.employees.push(employee(id, &format!("EMP-{id:03}")));
            }
            state.next_id = 1000;
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn mark_ineligible(&self, role: LockRole, employee_id: u64, missing: &[&str]) {
        self.lock()
            .ineligible
            .insert((role, employee_id), missing.iter().map(|s| s.to_string()).collect());
    }

    pub fn fail_lock_writes_for(&self, employee_id: u64) {
        self.lock().failing_lock_writes.insert(employee_id);
    }

    pub fn fail_employee_writes_for(&self, employee_id: u64) {
        self.lock().failing_employee_writes.insert(employee_id);
    }

    pub fn fail_payroll_writes_for(&self, employee_id: u64) {
        self.lock().failing_payroll_writes.insert(employee_id);
    }

    /// The next lookup of `period` misses even if the cycle exists, as when a
    /// concurrent request inserts it between lookup and insert.
    pub fn hide_cycle_once(&self, period: YearMonth) {
        self.lock().hidden_cycles.insert(period);
    }

    pub fn make_eligibility_unavailable(&self) {
        self.lock().eligibility_unavailable = true;
    }

    pub fn fail_audit_writes(&self) {
        self.lock().failing_audit = true;
    }

    pub fn deactivate(&self, employee_id: u64) {
        if let Some(e) = self.lock().employees.iter_mut().find(|e| e.id == employee_id) {
            e.is_active = false;
        }
    }

    pub fn add_cycle(&self, period: YearMonth, status: CycleStatus) -> PayrollCycle {
        let mut state = self.lock();
        let cycle = PayrollCycle {
            id: state.id(),
            period,
            status,
            reversion: None,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        state.cycles.push(cycle.clone());
        cycle
    }

    pub fn put_payroll(&self, payroll: MonthlyPayroll) -> u64 {
        let mut state = self.lock();
        let id = state.id();
        state.payrolls.push(MonthlyPayroll { id, ..payroll });
        id
    }

    pub fn cycle_inserts(&self) -> usize {
        self.lock().cycle_inserts
    }

    pub fn payroll_writes(&self) -> usize {
        self.lock().payroll_writes
    }

    pub fn cycle(&self, cycle_id: u64) -> Option<PayrollCycle> {
        self.lock().cycles.iter().find(|c| c.id == cycle_id).cloned()
    }

    pub fn locks(&self) -> Vec<EmployeePayrollLock> {
        self.lock().locks.clone()
    }

    pub fn reports(&self) -> Vec<PayrollReport> {
        self.lock().reports.clone()
    }

    pub fn audit_actions(&self) -> Vec<AuditAction> {
        self.lock().audit.iter().map(|a| a.action).collect()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    pub fn employee(&self, employee_id: u64) -> Option<Employee> {
        self.lock().employees.iter().find(|e| e.id == employee_id).cloned()
    }

    pub fn payroll_for(&self, employee_id: u64, period: YearMonth) -> Option<MonthlyPayroll> {
        self.lock()
            .payrolls
            .iter()
            .find(|p| p.employee_id == employee_id && p.month == period.month && p.year == period.year)
            .cloned()
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn list_cycles(&self) -> StoreResult<Vec<PayrollCycle>> {
        let mut cycles = self.lock().cycles.clone();
        cycles.sort_by_key(|c| c.period);
        Ok(cycles)
    }

    async fn find_cycle(&self, period: YearMonth) -> StoreResult<Option<PayrollCycle>> {
        let mut state = self.lock();
        if state.hidden_cycles.remove(&period) {
            return Ok(None);
        }
        Ok(state.cycles.iter().find(|c| c.period == period).cloned())
    }

    async fn find_cycle_by_id(&self, cycle_id: u64) -> StoreResult<Option<PayrollCycle>> {
        Ok(self.cycle(cycle_id))
    }

    async fn insert_cycle(&self, period: YearMonth) -> StoreResult<PayrollCycle> {
        let mut state = self.lock();
        if state.cycles.iter().any(|c| c.period == period) {
            return Err(StoreError::Duplicate(format!("payroll cycle {period}")));
        }
        state.cycle_inserts += 1;
        let cycle = PayrollCycle {
            id: state.id(),
            period,
            status: CycleStatus::Pending,
            reversion: None,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        state.cycles.push(cycle.clone());
        Ok(cycle)
    }

    async fn update_cycle(&self, cycle: &PayrollCycle) -> StoreResult<()> {
        let mut state = self.lock();
        let slot = state
            .cycles
            .iter_mut()
            .find(|c| c.id == cycle.id)
            .ok_or_else(|| StoreError::NotFound(format!("payroll cycle {}", cycle.id)))?;
        *slot = cycle.clone();
        Ok(())
    }

    async fn find_lock(&self, employee_id: u64, cycle_id: u64) -> StoreResult<Option<EmployeePayrollLock>> {
        Ok(self
            .lock()
            .locks
            .iter()
            .find(|l| l.employee_id == employee_id && l.cycle_id == cycle_id)
            .cloned())
    }

    async fn list_locks(&self, cycle_id: u64) -> StoreResult<Vec<EmployeePayrollLock>> {
        Ok(self.lock().locks.iter().filter(|l| l.cycle_id == cycle_id).cloned().collect())
    }

    async fn insert_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<u64> {
        let mut state = self.lock();
        if state.failing_lock_writes.contains(&lock.employee_id) {
            return Err(db_failure("lock insert"));
        }
        let id = state.id();
        state.locks.push(EmployeePayrollLock { id, ..lock.clone() });
        Ok(id)
    }

    async fn update_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<()> {
        let mut state = self.lock();
        if state.failing_lock_writes.contains(&lock.employee_id) {
            return Err(db_failure("lock update"));
        }
        let slot = state
            .locks
            .iter_mut()
            .find(|l| l.id == lock.id)
            .ok_or_else(|| StoreError::NotFound(format!("lock {}", lock.id)))?;
        *slot = lock.clone();
        Ok(())
    }

    async fn check_lock_eligibility(
        &self,
        role: LockRole,
        employee_id: u64,
        _cycle_id: u64,
    ) -> StoreResult<LockEligibility> {
        let state = self.lock();
        if state.eligibility_unavailable {
            return Err(StoreError::Unavailable("payroll_lock_requirements".into()));
        }
        Ok(match state.ineligible.get(&(role, employee_id)) {
            Some(missing) => LockEligibility::missing(missing.clone()),
            None => LockEligibility::allowed(),
        })
    }

    async fn lock_stats(&self, cycle_id: u64) -> StoreResult<LockStats> {
        let state = self.lock();
        let active: HashSet<u64> = state.employees.iter().filter(|e| e.is_active).map(|e| e.id).collect();
        let locks = state
            .locks
            .iter()
            .filter(|l| l.cycle_id == cycle_id && active.contains(&l.employee_id));
        let (hr, finance) = locks.fold((0, 0), |(hr, finance), l| {
            (hr + l.hr_locked as i64, finance + l.finance_locked as i64)
        });
        Ok(LockStats::from_counts(active.len() as i64, hr, finance))
    }

    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        let mut state = self.lock();
        if state.failing_audit {
            return Err(db_failure("audit"));
        }
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn upsert_report(&self, report: &PayrollReport) -> StoreResult<()> {
        let mut state = self.lock();
        let existing = state
            .reports
            .iter()
            .position(|r| r.period == report.period && r.report_type == report.report_type);
        match existing {
            Some(index) => {
                let id = state.reports[index].id;
                state.reports[index] = PayrollReport { id, ..report.clone() };
            }
            None => {
                let id = state.id();
                state.reports.push(PayrollReport { id, ..report.clone() });
            }
        }
        Ok(())
    }

    async fn find_report(&self, period: YearMonth, report_type: ReportType) -> StoreResult<Option<PayrollReport>> {
        Ok(self
            .lock()
            .reports
            .iter()
            .find(|r| r.period == period && r.report_type == report_type)
            .cloned())
    }

    async fn list_reports(&self) -> StoreResult<Vec<PayrollReport>> {
        let mut reports = self.reports();
        reports.sort_by(|a, b| b.period.cmp(&a.period));
        Ok(reports)
    }

    async fn list_employees_with_payroll(&self, period: YearMonth) -> StoreResult<Vec<EmployeeWithPayroll>> {
        let state = self.lock();
        let mut rows: Vec<EmployeeWithPayroll> = state
            .employees
            .iter()
            .map(|e| EmployeeWithPayroll {
                employee: e.clone(),
                payroll: state
                    .payrolls
                    .iter()
                    .find(|p| p.employee_id == e.id && p.month == period.month && p.year == period.year)
                    .cloned(),
            })
            .collect();
        rows.sort_by(|a, b| a.employee.employee_code.cmp(&b.employee.employee_code));
        Ok(rows)
    }

    async fn insert_employee(&self, employee: &Employee) -> StoreResult<u64> {
        let mut state = self.lock();
        if state.employees.iter().any(|e| e.employee_code == employee.employee_code) {
            return Err(StoreError::Duplicate(format!("employee {}", employee.employee_code)));
        }
        let id = state.id();
        state.employees.push(Employee { id, ..employee.clone() });
        Ok(id)
    }

    async fn set_employee_active(&self, employee_id: u64, is_active: bool) -> StoreResult<()> {
        let mut state = self.lock();
        let employee = state
            .employees
            .iter_mut()
            .find(|e| e.id == employee_id)
            .ok_or_else(|| StoreError::NotFound(format!("employee {employee_id}")))?;
        employee.is_active = is_active;
        Ok(())
    }

    async fn save_row_fields(
        &self,
        employee_id: u64,
        employee: &FieldMap,
        payroll: &PayrollWrite,
    ) -> StoreResult<()> {
        let mut state = self.lock();

        // Stage both rows first so a failure leaves the state untouched.
        let staged_employee = if employee.is_empty() {
            None
        } else {
            if state.failing_employee_writes.contains(&employee_id) {
                return Err(db_failure("employee update"));
            }
            let current = state
                .employees
                .iter()
                .find(|e| e.id == employee_id)
                .ok_or_else(|| StoreError::NotFound(format!("employee {employee_id}")))?;
            Some(merge(current, employee)?)
        };

        let staged_payroll = match payroll {
            PayrollWrite::Unchanged => None,
            PayrollWrite::Update { payroll_id, fields } => {
                let current = state
                    .payrolls
                    .iter()
                    .find(|p| p.id == *payroll_id)
                    .ok_or_else(|| StoreError::NotFound(format!("payroll {payroll_id}")))?;
                if state.failing_payroll_writes.contains(&current.employee_id) {
                    return Err(db_failure("payroll update"));
                }
                Some(merge(current, fields)?)
            }
            PayrollWrite::Insert(record) => {
                if state.failing_payroll_writes.contains(&record.employee_id) {
                    return Err(db_failure("payroll insert"));
                }
                Some(MonthlyPayroll {
                    id: state.id(),
                    ..record.clone()
                })
            }
        };

        if let Some(updated) = staged_employee {
            if let Some(slot) = state.employees.iter_mut().find(|e| e.id == employee_id) {
                *slot = updated;
            }
        }
        if let Some(updated) = staged_payroll {
            state.payroll_writes += 1;
            match state.payrolls.iter_mut().find(|p| p.id == updated.id) {
                Some(slot) => *slot = updated,
                None => state.payrolls.push(updated),
            }
        }
        Ok(())
    }
}
