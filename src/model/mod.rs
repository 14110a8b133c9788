pub mod audit;
pub mod employee;
pub mod monthly_payroll;
pub mod payroll_cycle;
pub mod payroll_lock;
pub mod payroll_report;
pub mod role;
