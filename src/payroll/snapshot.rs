use chrono::{DateTime, Utc};

use crate::model::employee::EmployeeWithPayroll;
use crate::model::payroll_report::{PayrollReport, ReportType};
use crate::payroll::month::YearMonth;

/// Freezes the active employees of a month into a snapshot report.
///
/// Rows are stored verbatim; finalized views render this instead of live tables.
pub fn build_snapshot(
    period: YearMonth,
    rows: Vec<EmployeeWithPayroll>,
    approved_by: Option<u64>,
    now: DateTime<Utc>,
) -> PayrollReport {
    let rows: Vec<EmployeeWithPayroll> = rows.into_iter().filter(|r| r.employee.is_active).collect();

    let (gross, deductions, net) = rows
        .iter()
        .filter_map(|r| r.payroll.as_ref())
        .fold((0.0, 0.0, 0.0), |(gross, deductions, net), p| {
            (gross + p.employee_salary, deductions + p.deduction_amount, net + p.net_pay)
        });

    PayrollReport {
        id: 0,
        period,
        report_name: format!("Payroll Report - {}", period.label()),
        report_type: ReportType::Snapshot,
        total_employees: rows.len() as i64,
        total_gross_salary: gross,
        total_deductions: deductions,
        total_net_salary: net,
        generated_by: approved_by,
        generated_at: now,
        is_finalized: true,
        finalized_at: Some(now),
        finance_approved_by: approved_by,
        report_data: rows,
    }
}
