//! Bearer token authentication
//!
//! Customer tokens are minted by the customer portal, service tokens by the
//! internal jobs that share the secret. Both are HS256 JWTs checked against
//! the configured issuer and audience.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::app_config::AuthConfig;
use crate::domain::auth::{Caller, CallerRole};
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

const BEARER_PREFIX: &str = "Bearer ";

/// JWT claims structure for validation
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: customer id, or the job name for service tokens
    pub sub: String,

    pub iss: String,

    pub aud: String,

    /// Issued at
    pub iat: usize,

    /// Expiration time
    pub exp: usize,

    /// Not before
    pub nbf: usize,

    /// JWT ID (unique identifier)
    pub jti: String,

    pub role: CallerRole,
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    /// Resolve the `Authorization` header into a caller
    pub fn authenticate(&self, header: Option<&str>) -> AppResult<Caller> {
        let result = self.authenticate_inner(header);
        if let Err(e) = &result {
            LoggingUtils::log_security_event("authentication_failed", &e.to_string(), "bearer_token");
        }
        result
    }

    fn authenticate_inner(&self, header: Option<&str>) -> AppResult<Caller> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Authentication("invalid token format".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_nbf = true;

        let claims = decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::Authentication(format!("JWT validation failed: {}", e)))?
            .claims;

        if claims.role == CallerRole::Customer && Uuid::parse_str(&claims.sub).is_err() {
            return Err(AppError::Authentication(format!(
                "customer token subject '{}' is not a customer id",
                claims.sub
            )));
        }

        debug!(subject = %claims.sub, role = ?claims.role, "Bearer token accepted");
        Ok(Caller {
            subject: claims.sub,
            role: claims.role,
        })
    }

    /// Mint a token for `caller` valid for `ttl_seconds`
    pub fn issue(&self, caller: &Caller, ttl_seconds: u64) -> AppResult<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = JwtClaims {
            sub: caller.subject.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl_seconds as usize,
            nbf: now,
            jti: Uuid::new_v4().to_string(),
            role: caller.role,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }
}
