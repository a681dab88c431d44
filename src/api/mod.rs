use crate::auth::{AuthGate, CredentialVerifier, TokenIssuer};
use crate::clock::Clock;
use crate::error::{ApiError, Result};
use crate::metrics::{self, MetricsService};
use crate::report::ReportGenerator;
use crate::validate::{normalize_sector, validate_sector};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

const SERVICE_NAME: &str = "Trade Opportunities API";

/// Shared application state, built once at startup and cloned per request
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
    pub issuer: Arc<TokenIssuer>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub reports: Arc<dyn ReportGenerator>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Option<MetricsService>,
    pub report_configured: bool,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/auth/login", post(login))
        .route("/auth/token", post(login))
        .route("/analyze/:sector", get(analyze))
        .route("/rate-limit", get(rate_limit_info))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    sector: String,
    report: String,
    generated_at: String,
}

#[derive(Debug, Serialize)]
struct RateLimitInfo {
    limit: u32,
    used: u32,
    remaining: u32,
    reset_in: u64,
}

/// Root endpoint with API information
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = if state.report_configured {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "service": SERVICE_NAME,
        "report_backend_configured": state.report_configured,
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(service) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain; version=0.0.4")
            .body(Body::from(service.render()))
            .unwrap(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Authenticate with HTTP Basic credentials and return a bearer token.
///
/// The bundled verifier accepts any non-empty username/password pair.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    let (username, password) = extract_basic_credentials(&headers)?;
    info!(username, "login attempt");

    if !state.credentials.verify(&username, &password) {
        warn!(username, "login rejected");
        metrics::record_auth_attempt("basic", false);
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.issuer.issue(&username, state.clock.now())?;
    metrics::record_auth_attempt("basic", true);
    info!(username, "login successful");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        expires_in: state.issuer.ttl().as_secs(),
    }))
}

/// Analyze trade opportunities for a sector.
///
/// Validates the sector, passes the request through the auth gate, then asks
/// the report backend for a Markdown report. Input validation runs before
/// admission so a rejected sector never consumes quota.
async fn analyze(
    State(state): State<AppState>,
    Path(sector): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let timer = metrics::Timer::new("GET", "/analyze/:sector");

    let sector = normalize_sector(&sector);
    if let Err(e) = validate_sector(&sector) {
        warn!(sector, "invalid sector format");
        timer.record(e.status_code().as_u16());
        return Err(e);
    }

    let admitted = match state.gate.admit(&headers) {
        Ok(admitted) => admitted,
        Err(e) => {
            timer.record(e.status_code().as_u16());
            return Err(e);
        }
    };
    info!(user_id = %admitted.identity, sector, "analysis request admitted");

    let report = match state.reports.generate_report(&sector).await {
        Ok(report) => report,
        Err(e) => {
            timer.record(e.status_code().as_u16());
            return Err(e);
        }
    };

    let response = Json(AnalyzeResponse {
        sector,
        report,
        generated_at: Utc::now().to_rfc3339(),
    })
    .into_response();

    let reset_in = admitted
        .admission
        .reset_at
        .saturating_sub(state.clock.now())
        .as_secs();
    let response = add_rate_limit_headers(
        response,
        state.gate.limit(),
        admitted.admission.remaining,
        reset_in,
    );

    timer.record(200);
    Ok(response)
}

/// Rate limit status for the authenticated user; consumes no quota
async fn rate_limit_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RateLimitInfo>> {
    let (identity, status) = state.gate.status(&headers)?;
    debug!(user_id = %identity, "rate limit status requested");

    let reset_in = status.reset_at.saturating_sub(state.clock.now()).as_secs();
    Ok(Json(RateLimitInfo {
        limit: status.limit,
        used: status.used,
        remaining: status.remaining,
        reset_in,
    }))
}

/// Add rate limit headers to a successful response
fn add_rate_limit_headers(
    mut response: Response,
    limit: u32,
    remaining: u32,
    reset_in: u64,
) -> Response {
    let headers = response.headers_mut();

    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&reset_in.to_string()).unwrap(),
    );

    response
}

/// Extract username and password from an HTTP Basic Authorization header
fn extract_basic_credentials(headers: &HeaderMap) -> Result<(String, String)> {
    let header = headers
        .get("authorization")
        .ok_or(ApiError::InvalidCredentials)?;

    let value = header
        .to_str()
        .map_err(|_| ApiError::InvalidCredentials)?;

    let encoded = value
        .strip_prefix("Basic ")
        .ok_or(ApiError::InvalidCredentials)?;

    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| ApiError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ApiError::InvalidCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(ApiError::InvalidCredentials)?;

    Ok((username.to_string(), password.to_string()))
}
