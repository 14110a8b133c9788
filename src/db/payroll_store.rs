use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool};

use crate::model::audit::AuditEntry;
use crate::model::employee::{EDITABLE_EMPLOYEE_FIELDS, Employee, EmployeeWithPayroll};
use crate::model::monthly_payroll::{EDITABLE_PAYROLL_FIELDS, MonthlyPayroll};
use crate::model::payroll_cycle::{PayrollCycle, PayrollCycleRow};
use crate::model::payroll_lock::{EmployeePayrollLock, LockEligibility, LockRole, LockStats, PayrollLockRequirement};
use crate::model::payroll_report::{PayrollReport, PayrollReportRow, ReportType};
use crate::payroll::eligibility::check_requirements;
use crate::payroll::month::YearMonth;
use crate::payroll::store::{FieldMap, PayrollStore, PayrollWrite, StoreError, StoreResult};
use crate::utils::db_utils::{build_update_sql, execute_update};

const MISSING_TABLE: &str = "42S02";
const DUPLICATE_KEY: &str = "23000";

const CYCLE_COLUMNS: &str = r#"
    id, month, year, status,
    hr_signoff_by, hr_signoff_at,
    finance_signoff_by, finance_signoff_at,
    reverted_by, reverted_at, reversion_reason,
    created_at, updated_at
"#;

const LOCK_COLUMNS: &str = r#"
    id, employee_id, cycle_id,
    hr_locked, hr_locked_by, hr_locked_at,
    finance_locked, finance_locked_by, finance_locked_at
"#;

const EMPLOYEE_COLUMNS: &str = r#"
    id, employee_code, employee_name, employment_status,
    pf_applicable, esi_applicable, designation, department,
    joining_date, end_date, current_salary,
    bank_account_number, bank_name, bank_ifsc_code,
    payment_mode, is_active
"#;

const PAYROLL_COLUMNS: &str = r#"
    id, employee_id, month, year, employee_salary,
    deduction_type, deduction_amount,
    addition_type, addition_amount,
    incentive_type, incentive_amount,
    pf_amount, esi_amount, net_pay,
    hr_remark, salary_processing_required, payment_status, remarks
"#;

const REPORT_COLUMNS: &str = r#"
    id, month, year, report_name, report_type,
    total_employees, total_gross_salary, total_deductions, total_net_salary,
    generated_by, generated_at, is_finalized, finalized_at,
    finance_approved_by, report_data
"#;

fn has_code(e: &sqlx::Error, code: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

fn is_missing_table(e: &sqlx::Error) -> bool {
    has_code(e, MISSING_TABLE)
}

fn report_from_row(row: PayrollReportRow) -> StoreResult<PayrollReport> {
    let report_type = ReportType::from_str(&row.report_type)
        .map_err(|_| StoreError::InvalidRow(format!("unknown report type {}", row.report_type)))?;

    Ok(PayrollReport {
        id: row.id,
        period: YearMonth {
            year: row.year,
            month: row.month,
        },
        report_name: row.report_name,
        report_type,
        total_employees: row.total_employees,
        total_gross_salary: row.total_gross_salary,
        total_deductions: row.total_deductions,
        total_net_salary: row.total_net_salary,
        generated_by: row.generated_by,
        generated_at: row.generated_at,
        is_finalized: row.is_finalized,
        finalized_at: row.finalized_at,
        finance_approved_by: row.finance_approved_by,
        report_data: serde_json::from_str(&row.report_data)?,
    })
}

/// [`PayrollStore`] over the MySQL schema in `migrations/`.
#[derive(Clone)]
pub struct MySqlPayrollStore {
    pool: MySqlPool,
}

impl MySqlPayrollStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_employee(&self, employee_id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn fetch_payroll(&self, employee_id: u64, period: YearMonth) -> StoreResult<Option<MonthlyPayroll>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM monthly_payroll WHERE employee_id = ? AND month = ? AND year = ?");
        Ok(sqlx::query_as::<_, MonthlyPayroll>(&sql)
            .bind(employee_id)
            .bind(period.month)
            .bind(period.year)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl PayrollStore for MySqlPayrollStore {
    async fn list_cycles(&self) -> StoreResult<Vec<PayrollCycle>> {
        let sql = format!("SELECT {CYCLE_COLUMNS} FROM monthly_payrolls ORDER BY year ASC, month ASC");
        let rows = sqlx::query_as::<_, PayrollCycleRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PayrollCycle::from).collect())
    }

    async fn find_cycle(&self, period: YearMonth) -> StoreResult<Option<PayrollCycle>> {
        let sql = format!("SELECT {CYCLE_COLUMNS} FROM monthly_payrolls WHERE month = ? AND year = ?");
        let row = sqlx::query_as::<_, PayrollCycleRow>(&sql)
            .bind(period.month)
            .bind(period.year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PayrollCycle::from))
    }

    async fn find_cycle_by_id(&self, cycle_id: u64) -> StoreResult<Option<PayrollCycle>> {
        let sql = format!("SELECT {CYCLE_COLUMNS} FROM monthly_payrolls WHERE id = ?");
        let row = sqlx::query_as::<_, PayrollCycleRow>(&sql)
            .bind(cycle_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PayrollCycle::from))
    }

    async fn insert_cycle(&self, period: YearMonth) -> StoreResult<PayrollCycle> {
        let result = sqlx::query(
            r#"
            INSERT INTO monthly_payrolls (month, year, status)
            VALUES (?, ?, 'pending')
            "#,
        )
        .bind(period.month)
        .bind(period.year)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, DUPLICATE_KEY) {
                StoreError::Duplicate(format!("payroll cycle {period}"))
            } else {
                e.into()
            }
        })?;

        let id = result.last_insert_id();
        self.find_cycle_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("payroll cycle {id}")))
    }

    async fn update_cycle(&self, cycle: &PayrollCycle) -> StoreResult<()> {
        let hr = cycle.status.hr_signoff();
        let finance = cycle.status.finance_signoff();
        let reversion = cycle.reversion.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE monthly_payrolls
            SET status = ?,
                hr_signoff_by = ?, hr_signoff_at = ?,
                finance_signoff_by = ?, finance_signoff_at = ?,
                reverted_by = ?, reverted_at = ?, reversion_reason = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(cycle.status.kind().as_ref())
        .bind(hr.and_then(|s| s.by))
        .bind(hr.map(|s| s.at))
        .bind(finance.and_then(|s| s.by))
        .bind(finance.map(|s| s.at))
        .bind(reversion.and_then(|r| r.by))
        .bind(reversion.map(|r| r.at))
        .bind(reversion.map(|r| r.reason.as_str()))
        .bind(Utc::now())
        .bind(cycle.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("payroll cycle {}", cycle.id)));
        }
        Ok(())
    }

    async fn find_lock(&self, employee_id: u64, cycle_id: u64) -> StoreResult<Option<EmployeePayrollLock>> {
        let sql = format!("SELECT {LOCK_COLUMNS} FROM employee_payroll_locks WHERE employee_id = ? AND cycle_id = ?");
        Ok(sqlx::query_as::<_, EmployeePayrollLock>(&sql)
            .bind(employee_id)
            .bind(cycle_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_locks(&self, cycle_id: u64) -> StoreResult<Vec<EmployeePayrollLock>> {
        let sql = format!("SELECT {LOCK_COLUMNS} FROM employee_payroll_locks WHERE cycle_id = ? ORDER BY employee_id");
        Ok(sqlx::query_as::<_, EmployeePayrollLock>(&sql)
            .bind(cycle_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO employee_payroll_locks
            (employee_id, cycle_id,
             hr_locked, hr_locked_by, hr_locked_at,
             finance_locked, finance_locked_by, finance_locked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lock.employee_id)
        .bind(lock.cycle_id)
        .bind(lock.hr_locked)
        .bind(lock.hr_locked_by)
        .bind(lock.hr_locked_at)
        .bind(lock.finance_locked)
        .bind(lock.finance_locked_by)
        .bind(lock.finance_locked_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn update_lock(&self, lock: &EmployeePayrollLock) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE employee_payroll_locks
            SET hr_locked = ?, hr_locked_by = ?, hr_locked_at = ?,
                finance_locked = ?, finance_locked_by = ?, finance_locked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(lock.hr_locked)
        .bind(lock.hr_locked_by)
        .bind(lock.hr_locked_at)
        .bind(lock.finance_locked)
        .bind(lock.finance_locked_by)
        .bind(lock.finance_locked_at)
        .bind(lock.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn check_lock_eligibility(
        &self,
        role: LockRole,
        employee_id: u64,
        cycle_id: u64,
    ) -> StoreResult<LockEligibility> {
        let requirements = sqlx::query_as::<_, PayrollLockRequirement>(
            r#"
            SELECT field_name, display_name, required_for_hr_lock, required_for_finance_lock
            FROM payroll_lock_requirements
            WHERE is_active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            if is_missing_table(&e) {
                StoreError::Unavailable("payroll_lock_requirements".to_string())
            } else {
                StoreError::from(e)
            }
        })?;

        let cycle = self
            .find_cycle_by_id(cycle_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("payroll cycle {cycle_id}")))?;
        let employee = self
            .fetch_employee(employee_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("employee {employee_id}")))?;
        let payroll = self.fetch_payroll(employee_id, cycle.period).await?;

        Ok(check_requirements(
            role,
            &EmployeeWithPayroll { employee, payroll },
            &requirements,
        ))
    }

    async fn lock_stats(&self, cycle_id: u64) -> StoreResult<LockStats> {
        let (total, hr, finance) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(CASE WHEN l.hr_locked THEN 1 END),
                COUNT(CASE WHEN l.finance_locked THEN 1 END)
            FROM employees e
            LEFT JOIN employee_payroll_locks l
                ON l.employee_id = e.id AND l.cycle_id = ?
            WHERE e.is_active = TRUE
            "#,
        )
        .bind(cycle_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(LockStats::from_counts(total, hr, finance))
    }

    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        let details = entry.details.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO payroll_audit_log
            (cycle_id, employee_id, action, performed_by, performed_at, details)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.cycle_id)
        .bind(entry.employee_id)
        .bind(entry.action.as_ref())
        .bind(entry.performed_by)
        .bind(entry.performed_at)
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_report(&self, report: &PayrollReport) -> StoreResult<()> {
        let report_data = serde_json::to_string(&report.report_data)?;

        sqlx::query(
            r#"
            INSERT INTO payroll_reports
            (month, year, report_name, report_type,
             total_employees, total_gross_salary, total_deductions, total_net_salary,
             generated_by, generated_at, is_finalized, finalized_at,
             finance_approved_by, report_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                report_name = VALUES(report_name),
                total_employees = VALUES(total_employees),
                total_gross_salary = VALUES(total_gross_salary),
                total_deductions = VALUES(total_deductions),
                total_net_salary = VALUES(total_net_salary),
                generated_by = VALUES(generated_by),
                generated_at = VALUES(generated_at),
                is_finalized = VALUES(is_finalized),
                finalized_at = VALUES(finalized_at),
                finance_approved_by = VALUES(finance_approved_by),
                report_data = VALUES(report_data)
            "#,
        )
        .bind(report.period.month)
        .bind(report.period.year)
        .bind(&report.report_name)
        .bind(report.report_type.as_ref())
        .bind(report.total_employees)
        .bind(report.total_gross_salary)
        .bind(report.total_deductions)
        .bind(report.total_net_salary)
        .bind(report.generated_by)
        .bind(report.generated_at)
        .bind(report.is_finalized)
        .bind(report.finalized_at)
        .bind(report.finance_approved_by)
        .bind(report_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_report(&self, period: YearMonth, report_type: ReportType) -> StoreResult<Option<PayrollReport>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM payroll_reports WHERE month = ? AND year = ? AND report_type = ?");
        let row = sqlx::query_as::<_, PayrollReportRow>(&sql)
            .bind(period.month)
            .bind(period.year)
            .bind(report_type.as_ref())
            .fetch_optional(&self.pool)
            .await?;
        row.map(report_from_row).transpose()
    }

    async fn list_reports(&self) -> StoreResult<Vec<PayrollReport>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM payroll_reports ORDER BY year DESC, month DESC");
        let rows = sqlx::query_as::<_, PayrollReportRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(report_from_row).collect()
    }

    async fn list_employees_with_payroll(&self, period: YearMonth) -> StoreResult<Vec<EmployeeWithPayroll>> {
        let employees_sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY employee_code");
        let payroll_sql = format!("SELECT {PAYROLL_COLUMNS} FROM monthly_payroll WHERE month = ? AND year = ?");

        let (employees, payrolls) = futures::try_join!(
            sqlx::query_as::<_, Employee>(&employees_sql).fetch_all(&self.pool),
            sqlx::query_as::<_, MonthlyPayroll>(&payroll_sql)
                .bind(period.month)
                .bind(period.year)
                .fetch_all(&self.pool),
        )?;

        let mut by_employee: HashMap<u64, MonthlyPayroll> =
            payrolls.into_iter().map(|p| (p.employee_id, p)).collect();

        Ok(employees
            .into_iter()
            .map(|employee| EmployeeWithPayroll {
                payroll: by_employee.remove(&employee.id),
                employee,
            })
            .collect())
    }

    async fn insert_employee(&self, employee: &Employee) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees
            (employee_code, employee_name, employment_status,
             pf_applicable, esi_applicable, designation, department,
             joining_date, end_date, current_salary,
             bank_account_number, bank_name, bank_ifsc_code,
             payment_mode, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&employee.employee_code)
        .bind(&employee.employee_name)
        .bind(&employee.employment_status)
        .bind(&employee.pf_applicable)
        .bind(&employee.esi_applicable)
        .bind(&employee.designation)
        .bind(&employee.department)
        .bind(employee.joining_date)
        .bind(employee.end_date)
        .bind(employee.current_salary)
        .bind(&employee.bank_account_number)
        .bind(&employee.bank_name)
        .bind(&employee.bank_ifsc_code)
        .bind(&employee.payment_mode)
        .bind(employee.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, DUPLICATE_KEY) {
                StoreError::Duplicate(format!("employee {}", employee.employee_code))
            } else {
                e.into()
            }
        })?;

        Ok(result.last_insert_id())
    }

    async fn set_employee_active(&self, employee_id: u64, is_active: bool) -> StoreResult<()> {
        if self.fetch_employee(employee_id).await?.is_none() {
            return Err(StoreError::NotFound(format!("employee {employee_id}")));
        }

        sqlx::query("UPDATE employees SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(employee_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_row_fields(
        &self,
        employee_id: u64,
        employee: &FieldMap,
        payroll: &PayrollWrite,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if !employee.is_empty() {
            let update = build_update_sql("employees", employee, EDITABLE_EMPLOYEE_FIELDS, "id", employee_id)?;
            execute_update(&mut tx, update).await?;
        }

        match payroll {
            PayrollWrite::Unchanged => {}
            PayrollWrite::Update { payroll_id, fields } => {
                let allowed: Vec<&str> = EDITABLE_PAYROLL_FIELDS.iter().copied().chain(["net_pay"]).collect();
                let update = build_update_sql("monthly_payroll", fields, &allowed, "id", *payroll_id)?;
                execute_update(&mut tx, update).await?;
            }
            PayrollWrite::Insert(record) => {
                insert_payroll(&mut tx, record).await?;
            }
        }

        // Dropping the transaction before this point rolls both writes back.
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_payroll(conn: &mut MySqlConnection, payroll: &MonthlyPayroll) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO monthly_payroll
        (employee_id, month, year, employee_salary,
         deduction_type, deduction_amount,
         addition_type, addition_amount,
         incentive_type, incentive_amount,
         pf_amount, esi_amount, net_pay,
         hr_remark, salary_processing_required, payment_status, remarks)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payroll.employee_id)
    .bind(payroll.month)
    .bind(payroll.year)
    .bind(payroll.employee_salary)
    .bind(&payroll.deduction_type)
    .bind(payroll.deduction_amount)
    .bind(&payroll.addition_type)
    .bind(payroll.addition_amount)
    .bind(&payroll.incentive_type)
    .bind(payroll.incentive_amount)
    .bind(payroll.pf_amount)
    .bind(payroll.esi_amount)
    .bind(payroll.net_pay)
    .bind(&payroll.hr_remark)
    .bind(&payroll.salary_processing_required)
    .bind(&payroll.payment_status)
    .bind(&payroll.remarks)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_id())
}
