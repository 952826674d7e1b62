use crate::service::{LookupObserver, LookupService, ServiceError};
use crate::storage::LookupRecord;
use crate::validate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Fixed size of the recent-history window.
const HISTORY_LIMIT: usize = 20;

pub struct AppState {
    pub service: Arc<LookupService>,
}

// ── Prometheus Metrics ────────────────────────────────────────────────────────

pub struct Metrics {
    registry: Registry,
    requests_total: Counter,
    lookups_total: Counter,
    lookup_failures_total: Counter,
    validations_total: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let requests_total = Counter::default();
        let lookups_total = Counter::default();
        let lookup_failures_total = Counter::default();
        let validations_total = Counter::default();

        registry.register(
            "leyline_requests_total",
            "Total number of HTTP requests",
            requests_total.clone(),
        );
        registry.register(
            "leyline_lookups_total",
            "Successfully recorded domain lookups",
            lookups_total.clone(),
        );
        registry.register(
            "leyline_lookup_failures_total",
            "Domain lookups that failed to resolve",
            lookup_failures_total.clone(),
        );
        registry.register(
            "leyline_validations_total",
            "IP validation requests served",
            validations_total.clone(),
        );

        Self {
            registry,
            requests_total,
            lookups_total,
            lookup_failures_total,
            validations_total,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupObserver for Metrics {
    fn lookup_succeeded(&self) {
        self.lookups_total.inc();
    }

    fn lookup_failed(&self) {
        self.lookup_failures_total.inc();
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// API-level error; every variant renders as `{"message": "..."}`.
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => Self::BadRequest(message),
            ServiceError::DomainNotResolvable(_) => {
                Self::NotFound("Invalid domain or unable to resolve domain".to_string())
            }
            ServiceError::Store(e) => {
                tracing::error!("storage failure: {}", e);
                Self::Internal("storage failure".to_string())
            }
            ServiceError::Internal(e) => {
                tracing::error!("resolver task failed: {}", e);
                Self::Internal("internal error".to_string())
            }
        }
    }
}

// ── Request / Response Types ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LookupParams {
    domain: Option<String>,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    ip: Option<String>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    ip: String,
    valid_ipv4: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    version: &'static str,
    date: i64,
    kubernetes: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>, metrics: Arc<Metrics>) -> Router {
    let requests_total = metrics.requests_total.clone();

    Router::new()
        .route("/", get(get_status))
        .route("/health", get(get_health))
        .route("/v1/tools/lookup", get(lookup_domain))
        .route(
            "/v1/tools/validate",
            post({
                let m = metrics.clone();
                move |body: Json<ValidateRequest>| validate_ip(m.clone(), body)
            }),
        )
        .route("/v1/history", get(get_history))
        .route(
            "/metrics",
            get({
                let m = metrics.clone();
                move || get_metrics(m.clone())
            }),
        )
        .layer(middleware::from_fn(move |req, next| {
            let counter = requests_total.clone();
            count_requests(req, next, counter)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_requests(
    req: axum::extract::Request,
    next: middleware::Next,
    counter: Counter,
) -> Response {
    counter.inc();
    next.run(req).await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        date: Utc::now().timestamp(),
        kubernetes: std::env::var("KUBERNETES_SERVICE_HOST").is_ok(),
    })
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn lookup_domain(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupRecord>, ApiError> {
    let domain = params
        .domain
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Domain parameter is required".to_string()))?;

    let record = state.service.lookup_and_record(&domain).await?;
    Ok(Json(record))
}

async fn validate_ip(
    metrics: Arc<Metrics>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let ip = body
        .ip
        .ok_or_else(|| ApiError::BadRequest("IP parameter is required".to_string()))?;

    metrics.validations_total.inc();
    let valid_ipv4 = validate::is_ipv4(&ip);
    Ok(Json(ValidateResponse { ip, valid_ipv4 }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LookupRecord>>, ApiError> {
    // Empty history is a successful empty list, deliberately not a 404.
    let records = state.service.recent_history(HISTORY_LIMIT)?;
    Ok(Json(records))
}

async fn get_metrics(metrics: Arc<Metrics>) -> impl IntoResponse {
    let mut buf = String::new();
    encode(&mut buf, &metrics.registry).unwrap();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buf,
    )
}
