use serde_json::Value;

use crate::model::employee::EmployeeWithPayroll;
use crate::model::payroll_lock::{LockEligibility, LockRole, PayrollLockRequirement};

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Required fields for `role` that are empty on the employee or its payroll
/// row. Payroll columns are looked up first, so a row without a payroll
/// record fails every payroll requirement.
pub fn check_requirements(
    role: LockRole,
    row: &EmployeeWithPayroll,
    requirements: &[PayrollLockRequirement],
) -> LockEligibility {
    let employee = serde_json::to_value(&row.employee).unwrap_or(Value::Null);
    let payroll = row
        .payroll
        .as_ref()
        .and_then(|p| serde_json::to_value(p).ok())
        .unwrap_or(Value::Null);

    let missing = requirements
        .iter()
        .filter(|req| req.required_for(role))
        .filter(|req| {
            let field = req.field_name.as_str();
            let value = payroll.get(field).or_else(|| employee.get(field));
            is_blank(value)
        })
        .map(|req| req.display_name.clone())
        .collect();

    LockEligibility::missing(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::Employee;
    use crate::model::monthly_payroll::MonthlyPayroll;
    use crate::payroll::month::YearMonth;

    fn requirement(field: &str, hr: bool, finance: bool) -> PayrollLockRequirement {
        PayrollLockRequirement {
            field_name: field.to_string(),
            display_name: field.replace('_', " "),
            required_for_hr_lock: hr,
            required_for_finance_lock: finance,
        }
    }

    fn row(bank_account: Option<&str>, with_payroll: bool) -> EmployeeWithPayroll {
        EmployeeWithPayroll {
            employee: Employee {
                id: 1,
                employee_code: "EMP-001".into(),
                employee_name: "Asha Rao".into(),
                employment_status: "Employed".into(),
                pf_applicable: "Yes".into(),
                esi_applicable: "No".into(),
                designation: Some("Engineer".into()),
                department: None,
                joining_date: None,
                end_date: None,
                current_salary: 50000.0,
                bank_account_number: bank_account.map(str::to_string),
                bank_name: None,
                bank_ifsc_code: None,
                payment_mode: "INR Account".into(),
                is_active: true,
            },
            payroll: with_payroll.then(|| MonthlyPayroll::defaults(1, YearMonth { year: 2025, month: 10 })),
        }
    }

    #[test]
    fn lists_blank_required_fields_for_the_role() {
        let requirements = vec![
            requirement("bank_account_number", false, true),
            requirement("department", true, false),
            requirement("designation", true, true),
        ];

        let hr = check_requirements(LockRole::Hr, &row(None, true), &requirements);
        assert!(!hr.can_lock);
        assert_eq!(hr.missing_fields, vec!["department".to_string()]);

        let finance = check_requirements(LockRole::Finance, &row(Some("  "), true), &requirements);
        assert_eq!(finance.missing_fields, vec!["bank account number".to_string()]);
    }

    #[test]
    fn payroll_requirements_fail_without_payroll_row() {
        let requirements = vec![requirement("hr_remark", true, false)];
        assert!(!check_requirements(LockRole::Hr, &row(None, false), &requirements).can_lock);
        assert!(check_requirements(LockRole::Hr, &row(None, true), &requirements).can_lock);
    }
}
