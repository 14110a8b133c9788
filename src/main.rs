use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod payroll;
mod routes;
mod utils;

use config::Config;
use db::{MySqlPayrollStore, init_db};

use crate::docs::ApiDoc;
use crate::payroll::workflow::{PayrollWorkflow, WorkflowSettings};
use crate::utils::workspace_cache::WorkspaceCache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

const WORKSPACE_CAPACITY: u64 = 10_000;

#[get("/")]
async fn index() -> impl Responder {
    "HRM payroll service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(
        company_start = %config.company_start,
        strict_eligibility_checks = config.strict_eligibility_checks,
        "Server starting..."
    );

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to the database")?;

    let workflow = Data::new(PayrollWorkflow::new(
        MySqlPayrollStore::new(pool),
        WorkflowSettings {
            company_start: config.company_start,
            strict_eligibility_checks: config.strict_eligibility_checks,
        },
    ));
    let workspaces = Data::new(WorkspaceCache::new(
        WORKSPACE_CAPACITY,
        Duration::from_secs(config.workspace_idle_secs),
    ));

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(workflow.clone())
            .app_data(workspaces.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            // Configure protected routes with rate limiting
            .configure(|cfg| routes::configure::<MySqlPayrollStore>(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
