use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::employee::EmployeeWithPayroll;
use crate::model::payroll_lock::{EmployeePayrollLock, LockRole};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardStats {
    #[schema(example = 240)]
    pub total_employees: i64,
    #[schema(example = 12)]
    pub pending_hr_signoff: i64,
    #[schema(example = 40)]
    pub pending_finance_signoff: i64,
    #[schema(example = 18250000.0)]
    pub total_payroll: f64,
    pub paid_count: i64,
    pub not_paid_count: i64,
}

/// Month overview over active employees. Pending counts are employees not
/// yet locked by the respective role.
pub fn dashboard_stats(rows: &[EmployeeWithPayroll], locks: &[EmployeePayrollLock]) -> DashboardStats {
    let by_employee: HashMap<u64, &EmployeePayrollLock> = locks.iter().map(|l| (l.employee_id, l)).collect();

    let mut stats = DashboardStats {
        total_employees: 0,
        pending_hr_signoff: 0,
        pending_finance_signoff: 0,
        total_payroll: 0.0,
        paid_count: 0,
        not_paid_count: 0,
    };

    for row in rows.iter().filter(|r| r.employee.is_active) {
        stats.total_employees += 1;

        let lock = by_employee.get(&row.employee.id);
        if !lock.is_some_and(|l| l.is_locked(LockRole::Hr)) {
            stats.pending_hr_signoff += 1;
        }
        if !lock.is_some_and(|l| l.is_locked(LockRole::Finance)) {
            stats.pending_finance_signoff += 1;
        }

        if let Some(payroll) = &row.payroll {
            stats.total_payroll += payroll.net_pay;
            match payroll.payment_status.as_str() {
                "Paid" => stats.paid_count += 1,
                "Not Paid" => stats.not_paid_count += 1,
                _ => {}
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::monthly_payroll::MonthlyPayroll;
    use crate::payroll::memory_store::employee;
    use crate::payroll::month::YearMonth;

    fn row(id: u64, status: Option<&str>, net: f64) -> EmployeeWithPayroll {
        let payroll = status.map(|s| {
            let mut p = MonthlyPayroll::defaults(id, YearMonth { year: 2025, month: 10 });
            p.payment_status = s.to_string();
            p.net_pay = net;
            p
        });
        EmployeeWithPayroll { employee: employee(id, &format!("EMP-{id:03}")), payroll }
    }

    #[test]
    fn counts_pending_locks_and_payment_state() {
        let mut inactive = row(4, Some("Paid"), 9999.0);
        inactive.employee.is_active = false;
        let rows = vec![row(1, Some("Paid"), 1000.0), row(2, Some("Not Paid"), 500.0), row(3, None, 0.0), inactive];

        let mut lock = EmployeePayrollLock::new(1, 9);
        lock.hr_locked = true;
        lock.finance_locked = true;
        let mut hr_only = EmployeePayrollLock::new(2, 9);
        hr_only.hr_locked = true;

        let stats = dashboard_stats(&rows, &[lock, hr_only]);

        assert_eq!(
            stats,
            DashboardStats {
                total_employees: 3,
                pending_hr_signoff: 1,
                pending_finance_signoff: 2,
                total_payroll: 1500.0,
                paid_count: 1,
                not_paid_count: 1,
            }
        );
    }
}
