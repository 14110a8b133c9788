use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlConnection;

use crate::payroll::store::{FieldMap, StoreError};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(column: &str, value: &Value) -> Result<SqlValue, StoreError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(StoreError::InvalidUpdate(format!("{column}: number out of range")));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => {
            return Err(StoreError::InvalidUpdate(format!(
                "{column}: unsupported JSON value type"
            )));
        }
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Column names come from the caller's map, so every key must be in
/// `allowed` before it is spliced into the statement.
pub fn build_update_sql(
    table: &str,
    fields: &FieldMap,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, StoreError> {
    if fields.is_empty() {
        return Err(StoreError::InvalidUpdate("no fields provided for update".into()));
    }

    if let Some(bad) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(StoreError::InvalidUpdate(format!("{bad} cannot be updated")));
    }

    // Build SET clause
    let set_clause = fields
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(fields.len() + 1);
    for (column, value) in fields {
        values.push(to_sql_value(column, value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
///
/// Takes a connection so the statement can run inside a caller's transaction.
pub async fn execute_update(conn: &mut MySqlConnection, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn builds_set_clause_with_typed_values() {
        let update = build_update_sql(
            "employees",
            &fields(json!({ "current_salary": 52000.5, "employee_name": "Asha", "joining_date": "2024-04-01" })),
            &["employee_name", "current_salary", "joining_date"],
            "id",
            7,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET current_salary = ?, employee_name = ?, joining_date = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::F64(52000.5),
                SqlValue::String("Asha".into()),
                SqlValue::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
                SqlValue::U64(7),
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_whitelist() {
        let err = build_update_sql(
            "employees",
            &fields(json!({ "is_active": false })),
            &["employee_name"],
            "id",
            1,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(m) if m.contains("is_active")));
    }

    #[test]
    fn rejects_empty_and_nested_values() {
        assert!(build_update_sql("employees", &FieldMap::new(), &[], "id", 1).is_err());
        assert!(
            build_update_sql("employees", &fields(json!({ "remarks": ["a"] })), &["remarks"], "id", 1).is_err()
        );
    }
}
