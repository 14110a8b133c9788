use crate::{
    api::{cycles, employees, locks, reports, signoff, workspace},
    auth::middleware::auth_middleware,
    config::Config,
    payroll::store::PayrollStore,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use tracing::warn;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Rejected rate limit settings, using governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure<S: PayrollStore>(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let bulk_limiter = Arc::new(build_limiter(config.rate_bulk_per_min));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/payroll")
                    // /payroll/cycles
                    .service(
                        web::resource("/cycles")
                            .route(web::get().to(cycles::list_cycles::<S>))
                            .route(web::post().to(cycles::get_or_create_cycle::<S>)),
                    )
                    .service(
                        web::resource("/cycles/{cycle_id}/stats").route(web::get().to(cycles::cycle_stats::<S>)),
                    )
                    // locks
                    .service(
                        web::resource("/cycles/{cycle_id}/locks").route(web::get().to(locks::list_locks::<S>)),
                    )
                    .service(
                        web::resource("/cycles/{cycle_id}/locks/{role}")
                            .wrap(bulk_limiter.clone())
                            .route(web::post().to(locks::bulk_lock::<S>)),
                    )
                    .service(
                        web::resource("/cycles/{cycle_id}/locks/{role}/{employee_id}")
                            .route(web::post().to(locks::toggle_lock::<S>)),
                    )
                    // sign-off
                    .service(
                        web::resource("/cycles/{cycle_id}/hr-signoff")
                            .route(web::post().to(signoff::hr_signoff::<S>)),
                    )
                    .service(
                        web::resource("/cycles/{cycle_id}/finance-signoff")
                            .route(web::post().to(signoff::finance_signoff::<S>)),
                    )
                    .service(
                        web::resource("/cycles/{cycle_id}/revert")
                            .route(web::post().to(signoff::revert_payroll::<S>)),
                    )
                    // workspace
                    .service(
                        web::resource("/workspace")
                            .route(web::get().to(workspace::get_workspace::<S>))
                            .route(web::delete().to(workspace::reset_workspace)),
                    )
                    .service(web::resource("/workspace/next").route(web::post().to(workspace::go_next::<S>)))
                    .service(web::resource("/workspace/prev").route(web::post().to(workspace::go_prev::<S>)))
                    .service(
                        web::resource("/workspace/active").route(web::post().to(workspace::go_to_active::<S>)),
                    )
                    .service(
                        web::resource("/workspace/goto").route(web::post().to(workspace::go_to_month::<S>)),
                    )
                    .service(
                        web::resource("/workspace/edits").route(web::put().to(workspace::update_field::<S>)),
                    )
                    .service(
                        web::resource("/workspace/edits/{employee_id}")
                            .route(web::delete().to(workspace::cancel_row)),
                    )
                    .service(
                        web::resource("/workspace/edits/{employee_id}/save")
                            .route(web::post().to(workspace::save_row::<S>)),
                    )
                    .service(
                        web::resource("/workspace/save-all")
                            .wrap(bulk_limiter.clone())
                            .route(web::post().to(workspace::save_all::<S>)),
                    )
                    // rows, dashboard, reports
                    .service(
                        web::resource("/employees").route(web::get().to(employees::list_payroll_rows::<S>)),
                    )
                    .service(web::resource("/dashboard").route(web::get().to(reports::dashboard::<S>)))
                    .service(web::resource("/reports").route(web::get().to(reports::list_reports::<S>)))
                    .service(
                        web::resource("/reports/{year}/{month}").route(web::get().to(reports::get_report::<S>)),
                    ),
            )
            .service(
                web::scope("/employees")
                    // /employees
                    .service(web::resource("").route(web::post().to(employees::create_employee::<S>)))
                    // /employees/bulk
                    .service(
                        web::resource("/bulk")
                            .wrap(bulk_limiter)
                            .route(web::post().to(employees::bulk_create_employees::<S>)),
                    )
                    // /employees/{employee_id}/active
                    .service(
                        web::resource("/{employee_id}/active")
                            .route(web::put().to(employees::set_employee_active::<S>)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::body::MessageBody;
    use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{App, web::Data};
    use chrono::Utc;
    use serde_json::{Value, json};

    use super::*;
    use crate::auth::jwt::test_tokens::token;
    use crate::model::payroll_cycle::{CycleStatus, Signoff};
    use crate::model::payroll_lock::LockRole;
    use crate::model::role::Role;
    use crate::models::TokenType;
    use crate::payroll::memory_store::MemoryStore;
    use crate::payroll::month::YearMonth;
    use crate::payroll::workflow::{PayrollWorkflow, WorkflowSettings};
    use crate::utils::workspace_cache::WorkspaceCache;

    const SECRET: &str = "routes-test-secret";
    const START: YearMonth = YearMonth { year: 2025, month: 10 };

    type Workflow = Data<PayrollWorkflow<MemoryStore>>;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: SECRET.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            db_max_connections: 1,
            rate_protected_per_min: 1000,
            rate_bulk_per_min: 1000,
            api_prefix: "/api".to_string(),
            log_dir: "logs".to_string(),
            company_start: START,
            strict_eligibility_checks: false,
            workspace_idle_secs: 60,
        }
    }

    fn workflow(store: MemoryStore) -> Workflow {
        Data::new(PayrollWorkflow::new(
            store,
            WorkflowSettings {
                company_start: START,
                strict_eligibility_checks: false,
            },
        ))
    }

    fn app(
        workflow: Workflow,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let config = config();
        App::new()
            .app_data(workflow)
            .app_data(Data::new(WorkspaceCache::new(100, Duration::from_secs(60))))
            .app_data(Data::new(config.clone()))
            .configure(move |cfg| configure::<MemoryStore>(cfg, config))
    }

    fn anonymous(request: TestRequest, uri: &str) -> TestRequest {
        request.uri(uri).peer_addr("127.0.0.1:40000".parse().unwrap())
    }

    fn as_role(request: TestRequest, uri: &str, role: Role) -> TestRequest {
        let bearer = format!("Bearer {}", token(7, role as u8, TokenType::Access, SECRET));
        anonymous(request, uri).insert_header(("Authorization", bearer))
    }

    #[actix_web::test]
    async fn requests_without_a_token_are_rejected() {
        let app = test::init_service(app(workflow(MemoryStore::new()))).await;

        let resp = test::call_service(&app, anonymous(TestRequest::get(), "/api/payroll/cycles").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn revert_is_admin_only() {
        let store = MemoryStore::with_employees(1);
        let cycle = store.add_cycle(
            START,
            CycleStatus::HrSigned {
                hr: Signoff { by: Some(2), at: Utc::now() },
            },
        );
        let wf = workflow(store);
        let app = test::init_service(app(wf.clone())).await;
        let uri = format!("/api/payroll/cycles/{}/revert", cycle.id);
        let body = json!({ "reason": "wrong salary sheet" });

        for role in [Role::Hr, Role::Finance] {
            let req = as_role(TestRequest::post(), &uri, role).set_json(&body).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        }
        assert!(wf.store().cycle(cycle.id).unwrap().status.hr_signoff().is_some());

        let req = as_role(TestRequest::post(), &uri, Role::Admin).set_json(&body).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert_eq!(wf.store().cycle(cycle.id).unwrap().status, CycleStatus::Pending);
    }

    #[actix_web::test]
    async fn lock_toggles_follow_the_callers_role() {
        let store = MemoryStore::with_employees(1);
        let cycle = store.add_cycle(START, CycleStatus::Pending);
        let wf = workflow(store);
        let app = test::init_service(app(wf.clone())).await;
        let body = json!({ "currently_locked": false });
        let hr_lock = format!("/api/payroll/cycles/{}/locks/hr/1", cycle.id);

        let req = as_role(TestRequest::post(), &hr_lock, Role::Finance).set_json(&body).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        assert!(wf.store().locks().is_empty());

        let req = as_role(TestRequest::post(), &hr_lock, Role::Hr).set_json(&body).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(wf.store().locks()[0].is_locked(LockRole::Hr));

        let unknown = format!("/api/payroll/cycles/{}/locks/payroll/1", cycle.id);
        let req = as_role(TestRequest::post(), &unknown, Role::Admin).set_json(&body).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn ineligible_lock_reports_missing_fields() {
        let store = MemoryStore::with_employees(1);
        let cycle = store.add_cycle(START, CycleStatus::Pending);
        store.mark_ineligible(LockRole::Hr, 1, &["IFSC Code"]);
        let app = test::init_service(app(workflow(store))).await;

        let req = as_role(
            TestRequest::post(),
            &format!("/api/payroll/cycles/{}/locks/hr/1", cycle.id),
            Role::Hr,
        )
        .set_json(json!({ "currently_locked": false }))
        .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["missing_fields"], json!(["IFSC Code"]));
    }

    #[actix_web::test]
    async fn workflow_refusals_map_to_status_codes() {
        let store = MemoryStore::with_employees(1);
        let cycle = store.add_cycle(START, CycleStatus::Pending);
        let app = test::init_service(app(workflow(store))).await;

        let signoff = format!("/api/payroll/cycles/{}/hr-signoff", cycle.id);
        let req = as_role(TestRequest::post(), &signoff, Role::Hr).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = as_role(TestRequest::get(), "/api/payroll/cycles/999/stats", Role::Hr).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let duplicate = json!({ "employee_code": "EMP-001", "employee_name": "Second Asha" });
        let req = as_role(TestRequest::post(), "/api/employees", Role::Finance)
            .set_json(&duplicate)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = as_role(TestRequest::post(), "/api/employees", Role::Hr)
            .set_json(&duplicate)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn page_far_past_the_end_returns_no_rows() {
        let app = test::init_service(app(workflow(MemoryStore::with_employees(3)))).await;

        let req = as_role(
            TestRequest::get(),
            "/api/payroll/employees?page=10000000&per_page=500",
            Role::Finance,
        )
        .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["page"], json!(10_000_000));
        assert_eq!(body["data"], json!([]));
    }
}
