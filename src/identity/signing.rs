//! Signed message tokens.
//!
//! Format: `hex(payload)--hex(keccak256(secret ++ payload))`.

use alloy::primitives::{hex, keccak256};
use thiserror::Error;

const SEPARATOR: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("token is not in payload--digest form")]
    Malformed,

    #[error("token is not valid hex")]
    Encoding,

    #[error("token digest does not match")]
    InvalidSignature,
}

#[derive(Clone)]
pub struct MessageVerifier {
    secret: Vec<u8>,
}

impl MessageVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Sign a payload.
    pub fn generate(&self, payload: &[u8]) -> String {
        format!(
            "{}{}{}",
            hex::encode(payload),
            SEPARATOR,
            hex::encode(self.digest(payload))
        )
    }

    /// Verify a token and return its payload.
    pub fn verify(&self, token: &str) -> Result<Vec<u8>, VerifyError> {
        let (payload, digest) = token.split_once(SEPARATOR).ok_or(VerifyError::Malformed)?;
        if payload.is_empty() || digest.is_empty() {
            return Err(VerifyError::Malformed);
        }

        let payload = hex::decode(payload).map_err(|_| VerifyError::Encoding)?;
        let digest = hex::decode(digest).map_err(|_| VerifyError::Encoding)?;

        let expected = self.digest(&payload);
        if digest.len() != expected.len() {
            return Err(VerifyError::InvalidSignature);
        }

        let diff = digest
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(VerifyError::InvalidSignature);
        }

        Ok(payload)
    }

    fn digest(&self, payload: &[u8]) -> [u8; 32] {
        let mut input = Vec::with_capacity(self.secret.len() + payload.len());
        input.extend_from_slice(&self.secret);
        input.extend_from_slice(payload);
        keccak256(&input).0
    }
}

impl std::fmt::Debug for MessageVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageVerifier").finish_non_exhaustive()
    }
}
