pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod report;
pub mod validate;

use crate::api::AppState;
use crate::auth::{AllowAll, AuthGate, TokenIssuer};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::{ApiError, Result};
use crate::metrics::MetricsService;
use crate::rate_limit::SlidingWindowLimiter;
use crate::report::{GeminiReportGenerator, ReportGenerator, UnconfiguredReportGenerator};
use std::sync::Arc;
use tracing::{info, warn};

/// Build application state from configuration.
///
/// The rate limiter and token issuer are constructed once here and shared by
/// every request; nothing in the request path creates global state.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let issuer = Arc::new(TokenIssuer::new(&config.auth)?);
    let limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limit.clone()));
    let gate = AuthGate::new(
        Arc::clone(&issuer),
        Arc::clone(&limiter),
        Arc::clone(&clock),
    );

    let report_configured = config.report.api_key.is_some();
    let reports: Arc<dyn ReportGenerator> = if report_configured {
        Arc::new(GeminiReportGenerator::new(&config.report)?)
    } else {
        warn!("GEMINI_API_KEY not configured; report generation will be unavailable");
        Arc::new(UnconfiguredReportGenerator)
    };

    Ok(AppState {
        gate,
        issuer,
        credentials: Arc::new(AllowAll),
        reports,
        clock,
        metrics: None,
        report_configured,
    })
}

/// Initialize and run the server
pub async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;

    info!("Starting {}", env!("CARGO_PKG_NAME"));
    info!(
        "Rate limit: {} requests per {} seconds per user",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );

    let mut state = build_state(&config)?;
    state.metrics = Some(MetricsService::new()?);

    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(ApiError::Io)?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trade_opportunities=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
