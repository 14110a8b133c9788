pub mod payroll_store;

use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

pub use payroll_store::MySqlPayrollStore;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
