//! Postback signature verification

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::shared::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the postback signature
pub const SIGNATURE_HEADER: &str = "x-netcash-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 over the raw body, hex encoded, compared in constant time.
///
/// An empty secret disables verification; configuration only allows that
/// in development mode.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn is_enforced(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Hex signature for a body, as the gateway would send it
    pub fn sign(&self, payload: &[u8]) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Fails with `Unauthorized` unless the signature matches
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()> {
        if !self.is_enforced() {
            tracing::warn!("Webhook signature verification disabled - accepting unsigned postback");
            return Ok(());
        }

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing signature".to_string()))?;
        let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
        let provided =
            hex::decode(signature).map_err(|_| AppError::Unauthorized("malformed signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.len() == provided.len() && bool::from(expected.as_slice().ct_eq(&provided)) {
            Ok(())
        } else {
            Err(AppError::Unauthorized("signature mismatch".to_string()))
        }
    }
}
