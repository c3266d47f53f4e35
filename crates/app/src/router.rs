use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use promo_admin_core::{EmployeeRepository, Partner, Repository, Role};
use promo_admin_storage::Repositories;

use crate::limits::{Clock, PartnerLimitExecutor};
use crate::problem::ProblemResponse;
use crate::{employees, partners, roles, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    repositories: Repositories,
    limits: PartnerLimitExecutor,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, repositories: Repositories) -> Self {
        Self::with_clock(metrics, repositories, Arc::new(Utc::now))
    }

    pub fn with_clock(metrics: PrometheusHandle, repositories: Repositories, clock: Clock) -> Self {
        let limits = PartnerLimitExecutor::new(repositories.partners.clone(), clock);
        Self {
            metrics,
            repositories,
            limits,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn employees(&self) -> &dyn EmployeeRepository {
        self.repositories.employees.as_ref()
    }

    pub fn roles(&self) -> &dyn Repository<Role> {
        self.repositories.roles.as_ref()
    }

    pub fn partners(&self) -> &dyn Repository<Partner> {
        self.repositories.partners.as_ref()
    }

    pub fn limits(&self) -> &PartnerLimitExecutor {
        &self.limits
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(
            "/api/v1/employees",
            get(employees::list).post(employees::create),
        )
        .route(
            "/api/v1/employees/by-email/:email",
            get(employees::get_by_email),
        )
        .route(
            "/api/v1/employees/:id",
            get(employees::get)
                .put(employees::update)
                .delete(employees::delete),
        )
        .route("/api/v1/roles", get(roles::list))
        .route("/api/v1/partners", get(partners::list))
        .route("/api/v1/partners/:id/limits", post(partners::set_limit))
        .route(
            "/api/v1/partners/:id/limits/:limit_id",
            get(partners::get_limit),
        )
        .route(
            "/api/v1/partners/:id/canceledLimits",
            post(partners::cancel_limit),
        )
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
}

async fn fallback() -> Response {
    ProblemResponse::not_found("no route matches the request").into_response()
}
