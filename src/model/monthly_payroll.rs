use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::payroll::month::YearMonth;

/// The sentinel selected in type dropdowns when nothing applies.
pub const NIL: &str = "Nil";

/// One employee's payroll figures for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MonthlyPayroll {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 85000.0)]
    pub employee_salary: f64,
    #[schema(example = "Nil")]
    pub deduction_type: String,
    pub deduction_amount: f64,
    #[schema(example = "Nil")]
    pub addition_type: String,
    pub addition_amount: f64,
    #[schema(example = "Nil")]
    pub incentive_type: String,
    pub incentive_amount: f64,
    pub pf_amount: f64,
    pub esi_amount: f64,
    pub net_pay: f64,
    #[schema(example = "Process Payroll")]
    pub hr_remark: String,
    #[schema(example = "Yes")]
    pub salary_processing_required: String,
    #[schema(example = "Nil")]
    pub payment_status: String,
    #[schema(nullable = true)]
    pub remarks: Option<String>,
}

impl MonthlyPayroll {
    /// Defaults used when a month's row is created for the first time.
    pub fn defaults(employee_id: u64, period: YearMonth) -> Self {
        Self {
            id: 0,
            employee_id,
            month: period.month,
            year: period.year,
            employee_salary: 0.0,
            deduction_type: NIL.to_string(),
            deduction_amount: 0.0,
            addition_type: NIL.to_string(),
            addition_amount: 0.0,
            incentive_type: NIL.to_string(),
            incentive_amount: 0.0,
            pf_amount: 0.0,
            esi_amount: 0.0,
            net_pay: 0.0,
            hr_remark: NIL.to_string(),
            salary_processing_required: "Yes".to_string(),
            payment_status: NIL.to_string(),
            remarks: None,
        }
    }

    pub fn compute_net_pay(&self) -> f64 {
        self.employee_salary + self.addition_amount + self.incentive_amount
            - self.deduction_amount
            - self.pf_amount
            - self.esi_amount
    }
}

/// Payroll columns that may be edited through the workspace. `net_pay` is
/// always derived.
pub const EDITABLE_PAYROLL_FIELDS: &[&str] = &[
    "employee_salary",
    "deduction_type",
    "deduction_amount",
    "addition_type",
    "addition_amount",
    "incentive_type",
    "incentive_amount",
    "pf_amount",
    "esi_amount",
    "hr_remark",
    "salary_processing_required",
    "payment_status",
    "remarks",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_pay_adds_earnings_and_subtracts_deductions() {
        let mut payroll = MonthlyPayroll::defaults(1, YearMonth { year: 2025, month: 10 });
        payroll.employee_salary = 50000.0;
        payroll.addition_amount = 2000.0;
        payroll.incentive_amount = 1000.0;
        payroll.deduction_amount = 500.0;
        payroll.pf_amount = 1800.0;
        payroll.esi_amount = 200.0;
        assert_eq!(payroll.compute_net_pay(), 50500.0);
    }

    #[test]
    fn defaults_use_nil_sentinels() {
        let payroll = MonthlyPayroll::defaults(4, YearMonth { year: 2026, month: 1 });
        assert_eq!(payroll.deduction_type, NIL);
        assert_eq!(payroll.salary_processing_required, "Yes");
        assert_eq!((payroll.month, payroll.year), (1, 2026));
    }
}
