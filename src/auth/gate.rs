use super::token::TokenIssuer;
use crate::clock::Clock;
use crate::error::{ApiError, Result};
use crate::metrics;
use crate::rate_limit::{Admission, RateStatus, SlidingWindowLimiter};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a successful pass through the gate
#[derive(Debug, Clone)]
pub struct AdmittedRequest {
    /// Identity embedded in the verified token
    pub identity: String,
    /// Quota granted to this request
    pub admission: Admission,
}

/// Gate in front of protected handlers: token verification followed by
/// rate-limit admission.
///
/// Each call is terminal in one pass; rejection at either step means the
/// protected handler never runs. The gate itself holds no state beyond the
/// injected issuer, limiter and clock.
#[derive(Clone)]
pub struct AuthGate {
    issuer: Arc<TokenIssuer>,
    limiter: Arc<SlidingWindowLimiter>,
    clock: Arc<dyn Clock>,
}

impl AuthGate {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        limiter: Arc<SlidingWindowLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            limiter,
            clock,
        }
    }

    /// Admit or reject one request based on its `Authorization` header.
    pub fn admit(&self, headers: &HeaderMap) -> Result<AdmittedRequest> {
        let token = extract_bearer(headers)?;
        let now = self.clock.now();

        let identity = match self.issuer.verify(&token, now) {
            Ok(identity) => {
                metrics::record_auth_attempt("bearer", true);
                identity
            }
            Err(e) => {
                warn!(error = %e, "authentication failed");
                metrics::record_auth_attempt("bearer", false);
                return Err(e);
            }
        };

        let admission = match self.limiter.try_acquire(&identity, now) {
            Ok(admission) => admission,
            Err(e) => {
                metrics::record_rate_limit_exceeded(&identity);
                return Err(e);
            }
        };

        debug!(
            user_id = %identity,
            remaining = admission.remaining,
            "request admitted"
        );
        Ok(AdmittedRequest {
            identity,
            admission,
        })
    }

    /// Token check plus a read-only window snapshot; consumes no quota.
    pub fn status(&self, headers: &HeaderMap) -> Result<(String, RateStatus)> {
        let token = extract_bearer(headers)?;
        let now = self.clock.now();
        let identity = self.issuer.verify(&token, now)?;
        let status = self.limiter.status(&identity, now);
        Ok((identity, status))
    }

    /// Configured request ceiling, for response headers.
    pub fn limit(&self) -> u32 {
        self.limiter.limit()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Result<String> {
    let auth_header = headers.get("authorization").ok_or(ApiError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::MalformedToken("Invalid authorization header".to_string()))?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        Ok(token.to_string())
    } else if let Some(token) = auth_str.strip_prefix("bearer ") {
        Ok(token.to_string())
    } else {
        Err(ApiError::MalformedToken(
            "Authorization header must start with 'Bearer '".to_string(),
        ))
    }
}
