use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;

use crate::payroll::month::YearMonth;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_bulk_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Payroll
    pub company_start: YearMonth,
    pub strict_eligibility_checks: bool,
    pub workspace_idle_secs: u64,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let start_year: i32 = parsed_or("COMPANY_START_YEAR", 2025)?;
        let start_month: u32 = parsed_or("COMPANY_START_MONTH", 10)?;
        let Some(company_start) = YearMonth::new(start_year, start_month) else {
            bail!("COMPANY_START_MONTH must be between 1 and 12, got {start_month}");
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,

            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_bulk_per_min: parsed_or("RATE_BULK_PER_MIN", 30)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            company_start,
            strict_eligibility_checks: parsed_or("STRICT_ELIGIBILITY_CHECKS", false)?,
            workspace_idle_secs: parsed_or("WORKSPACE_IDLE_SECS", 8 * 60 * 60)?,
        })
    }
}
