use serde::Deserialize;
use strum_macros::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::model::employee::EmployeeWithPayroll;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActiveFilter {
    #[default]
    Active,
    Deactivated,
    All,
}

/// Query filters of the payroll grid. Empty strings are treated as unset.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeFilter {
    /// Case-insensitive match on employee code or name.
    pub search: Option<String>,
    pub employment_status: Option<String>,
    pub pf_applicable: Option<String>,
    pub esi_applicable: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub payment_mode: Option<String>,
    pub deduction_type: Option<String>,
    pub addition_type: Option<String>,
    pub incentive_type: Option<String>,
    pub hr_remark: Option<String>,
    pub salary_processing_required: Option<String>,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub is_active: ActiveFilter,
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn matches_exact(wanted: &Option<String>, actual: Option<&str>) -> bool {
    match set(wanted) {
        Some(w) => actual == Some(w),
        None => true,
    }
}

impl EmployeeFilter {
    pub fn matches(&self, row: &EmployeeWithPayroll) -> bool {
        let e = &row.employee;
        let p = row.payroll.as_ref();

        let active_ok = match self.is_active {
            ActiveFilter::Active => e.is_active,
            ActiveFilter::Deactivated => !e.is_active,
            ActiveFilter::All => true,
        };

        let search_ok = set(&self.search).is_none_or(|s| {
            let needle = s.to_lowercase();
            e.employee_code.to_lowercase().contains(&needle) || e.employee_name.to_lowercase().contains(&needle)
        });

        active_ok
            && search_ok
            && matches_exact(&self.employment_status, Some(&e.employment_status))
            && matches_exact(&self.pf_applicable, Some(&e.pf_applicable))
            && matches_exact(&self.esi_applicable, Some(&e.esi_applicable))
            && matches_exact(&self.designation, e.designation.as_deref())
            && matches_exact(&self.department, e.department.as_deref())
            && matches_exact(&self.payment_mode, Some(&e.payment_mode))
            && matches_exact(&self.deduction_type, p.map(|p| p.deduction_type.as_str()))
            && matches_exact(&self.addition_type, p.map(|p| p.addition_type.as_str()))
            && matches_exact(&self.incentive_type, p.map(|p| p.incentive_type.as_str()))
            && matches_exact(&self.hr_remark, p.map(|p| p.hr_remark.as_str()))
            && matches_exact(
                &self.salary_processing_required,
                p.map(|p| p.salary_processing_required.as_str()),
            )
            && matches_exact(&self.payment_status, p.map(|p| p.payment_status.as_str()))
    }

    pub fn apply(&self, rows: Vec<EmployeeWithPayroll>) -> Vec<EmployeeWithPayroll> {
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::monthly_payroll::MonthlyPayroll;
    use crate::payroll::memory_store::employee;
    use crate::payroll::month::YearMonth;

    fn rows() -> Vec<EmployeeWithPayroll> {
        let mut paid = MonthlyPayroll::defaults(1, YearMonth { year: 2025, month: 10 });
        paid.payment_status = "Paid".into();

        let mut left = employee(3, "EMP-003");
        left.is_active = false;
        left.employee_name = "Meera Iyer".into();

        vec![
            EmployeeWithPayroll { employee: employee(1, "EMP-001"), payroll: Some(paid) },
            EmployeeWithPayroll { employee: employee(2, "EMP-002"), payroll: None },
            EmployeeWithPayroll { employee: left, payroll: None },
        ]
    }

    fn ids(rows: Vec<EmployeeWithPayroll>) -> Vec<u64> {
        rows.into_iter().map(|r| r.employee.id).collect()
    }

    #[test]
    fn defaults_to_active_employees() {
        assert_eq!(ids(EmployeeFilter::default().apply(rows())), vec![1, 2]);
    }

    #[test]
    fn active_filter_variants() {
        let deactivated = EmployeeFilter { is_active: ActiveFilter::Deactivated, ..Default::default() };
        assert_eq!(ids(deactivated.apply(rows())), vec![3]);

        let all = EmployeeFilter { is_active: ActiveFilter::All, ..Default::default() };
        assert_eq!(ids(all.apply(rows())).len(), 3);
    }

    #[test]
    fn search_is_case_insensitive_over_code_and_name() {
        let filter = EmployeeFilter {
            search: Some("meera".into()),
            is_active: ActiveFilter::All,
            ..Default::default()
        };
        assert_eq!(ids(filter.apply(rows())), vec![3]);

        let by_code = EmployeeFilter { search: Some("emp-002".into()), ..Default::default() };
        assert_eq!(ids(by_code.apply(rows())), vec![2]);
    }

    #[test]
    fn payroll_filters_exclude_rows_without_payroll() {
        let filter = EmployeeFilter { payment_status: Some("Paid".into()), ..Default::default() };
        assert_eq!(ids(filter.apply(rows())), vec![1]);
    }

    #[test]
    fn empty_values_are_ignored() {
        let filter = EmployeeFilter {
            department: Some(String::new()),
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(ids(filter.apply(rows())), vec![1, 2]);
    }
}
