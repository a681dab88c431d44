use crate::config::AuthConfig;
use crate::error::{ApiError, Result};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// JWT claims carried by issued tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the username the token was issued for)
    pub sub: String,
    /// Issued at (Unix timestamp, seconds)
    pub iat: u64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: u64,
}

/// Issues and verifies signed, time-bound identity tokens.
///
/// Tokens are HS256 JWTs valid for `[iat, exp)`. The signing key is fixed
/// for the lifetime of the process; there is no revocation list, so rotating
/// the key invalidates every outstanding token.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create a token issuer from configuration.
    ///
    /// When no signing key is configured a random one is generated, matching
    /// the behavior of running without `JWT_SECRET_KEY`: the service works,
    /// but a restart invalidates previously issued tokens.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.ttl_minutes == 0 {
            return Err(ApiError::Config(
                "Token ttl_minutes must be > 0".to_string(),
            ));
        }

        let secret: Secret<String> = match &config.secret {
            Some(secret) => Secret::new(secret.clone()),
            None => {
                warn!(
                    "No signing key configured; generated a random one. \
                     Tokens will not survive a restart."
                );
                Secret::new(
                    rand::thread_rng()
                        .sample_iter(&Alphanumeric)
                        .take(43)
                        .map(char::from)
                        .collect(),
                )
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock in verify(), not the
        // library's wall clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
            ttl: Duration::from_secs(config.ttl_minutes * 60),
        })
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `identity`, valid from `now` until `now + ttl`.
    pub fn issue(&self, identity: &str, now: Duration) -> Result<String> {
        let claims = Claims {
            sub: identity.to_string(),
            iat: now.as_secs(),
            exp: (now + self.ttl).as_secs(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

        info!(identity, "token issued");
        Ok(token)
    }

    /// Verify signature and validity window, returning the embedded identity.
    ///
    /// A token outside `[iat, exp)` is rejected regardless of signature
    /// correctness; a token with a wrong signature is rejected regardless of
    /// its claims.
    pub fn verify(&self, token: &str, now: Duration) -> Result<String> {
        let data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => ApiError::BadSignature,
                    _ => ApiError::MalformedToken(e.to_string()),
                }
            })?;

        let claims = data.claims;
        if now.as_secs() < claims.iat {
            return Err(ApiError::TokenNotYetValid);
        }
        if now.as_secs() >= claims.exp {
            return Err(ApiError::TokenExpired);
        }

        Ok(claims.sub)
    }
}
