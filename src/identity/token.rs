//! Identification tokens.
//!
//! A token is a signed JSON payload `{"ext": "<identifiers>", "exp": <unix secs>}`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::signing::{MessageVerifier, VerifyError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("token payload is not valid JSON")]
    Payload,

    #[error("token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    ext: String,
    exp: u64,
}

#[derive(Debug, Clone)]
pub struct TokenIdentifier {
    verifier: MessageVerifier,
}

impl TokenIdentifier {
    pub fn new(secret: &str) -> Self {
        Self {
            verifier: MessageVerifier::new(secret),
        }
    }

    /// Issue a token carrying `identifiers`, valid for `ttl`.
    pub fn issue(&self, identifiers: &str, ttl: Duration) -> String {
        let claims = Claims {
            ext: identifiers.to_string(),
            exp: (now() + ttl).as_secs(),
        };
        // Serializing two plain fields cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        self.verifier.generate(&payload)
    }

    /// Verify a token and return the identifiers it carries.
    pub fn identify(&self, token: &str) -> Result<String, TokenError> {
        let payload = self.verifier.verify(token)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Payload)?;

        if claims.exp <= now().as_secs() {
            return Err(TokenError::Expired);
        }

        Ok(claims.ext)
    }
}

fn now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
