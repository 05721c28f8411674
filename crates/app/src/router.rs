use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use jobtrack_storage::Database;

use crate::auth::AuthTokenValidator;
use crate::service::{Clock, JobService};
use crate::{jobs, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    clock: Clock,
    service: JobService,
    token_validator: AuthTokenValidator,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, token_secret: &[u8]) -> Self {
        let clock: Clock = Arc::new(Utc::now);
        let service = JobService::new(storage, clock.clone());
        Self {
            metrics,
            clock,
            service,
            token_validator: AuthTokenValidator::new(token_secret),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock.clone();
        self.service = self.service.with_clock(clock);
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn jobs(&self) -> &JobService {
        &self.service
    }

    pub fn token_validator(&self) -> &AuthTokenValidator {
        &self.token_validator
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/jobs", get(jobs::list).post(jobs::create))
        .route("/api/jobs/stats", get(jobs::stats))
        .route("/api/jobs/reminders", get(jobs::reminders))
        .route(
            "/api/jobs/:id",
            get(jobs::get_one).put(jobs::update).delete(jobs::remove),
        )
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
        .into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::auth::tests::TEST_SECRET;

    pub(crate) async fn setup_state() -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let database = Database::in_memory().await.expect("connect");
        database.run_migrations().await.expect("migrations");
        AppState::new(metrics, database, TEST_SECRET)
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_router(setup_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = app_router(setup_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }
}
