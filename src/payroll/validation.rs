use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::model::monthly_payroll::NIL;

/// Per-adjustment errors of one row; empty means the row may be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RowValidationErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive: Option<String>,
}

impl RowValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.deduction.is_none() && self.addition.is_none() && self.incentive.is_none()
    }

    pub fn messages(&self) -> Vec<String> {
        [&self.deduction, &self.addition, &self.incentive]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Reads a loosely typed amount the way the edit grid submits it: numbers,
/// numeric strings, or nothing (zero).
fn amount_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn selected_type(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() && s != NIL => Some(s.as_str()),
        _ => None,
    }
}

/// Every selected deduction, addition and incentive type needs a positive amount.
///
/// `field` resolves a payroll column to its effective value (pending edit
/// first, persisted value otherwise).
pub fn validate_type_amounts<F>(field: F) -> RowValidationErrors
where
    F: Fn(&str) -> Option<Value>,
{
    let check = |label: &str, type_field: &str, amount_field: &str| -> Option<String> {
        let type_value = field(type_field);
        let selected = selected_type(type_value.as_ref())?;
        let amount = amount_value(field(amount_field).as_ref());
        (amount <= 0.0).then(|| {
            format!("{label} amount must be greater than 0 when \"{selected}\" is selected")
        })
    };

    RowValidationErrors {
        deduction: check("Deduction", "deduction_type", "deduction_amount"),
        addition: check("Addition", "addition_type", "addition_amount"),
        incentive: check("Incentive", "incentive_type", "incentive_amount"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(values: Value) -> impl Fn(&str) -> Option<Value> {
        let map: HashMap<String, Value> = serde_json::from_value(values).unwrap();
        move |field| map.get(field).cloned()
    }

    #[test]
    fn selected_type_with_zero_amount_is_rejected() {
        let errors = validate_type_amounts(lookup(json!({
            "deduction_type": "Bonus Clawback",
            "deduction_amount": 0
        })));
        assert_eq!(
            errors.deduction.as_deref(),
            Some("Deduction amount must be greater than 0 when \"Bonus Clawback\" is selected")
        );
        assert!(errors.addition.is_none());
        assert!(!errors.is_empty());
    }

    #[test]
    fn nil_or_empty_type_needs_no_amount() {
        let errors = validate_type_amounts(lookup(json!({
            "deduction_type": "Nil",
            "addition_type": "",
            "incentive_amount": 0
        })));
        assert!(errors.is_empty());
    }

    #[test]
    fn positive_amounts_pass_including_numeric_strings() {
        let errors = validate_type_amounts(lookup(json!({
            "deduction_type": "Loan",
            "deduction_amount": 1500,
            "incentive_type": "Referral",
            "incentive_amount": "2500"
        })));
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_amount_counts_as_zero() {
        let errors = validate_type_amounts(lookup(json!({ "addition_type": "Arrears" })));
        assert_eq!(errors.messages().len(), 1);
        assert!(errors.addition.is_some());
    }
}
