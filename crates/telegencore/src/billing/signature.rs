//! Webhook authenticity checks

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::core::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Crypto Pay signature
pub const CRYPTOBOT_SIGNATURE_HEADER: &str = "crypto-pay-api-signature";

/// Computes the hex signature Crypto Pay sends for `body`.
///
/// The HMAC key is SHA-256 of the API token, not the token itself.
pub fn cryptobot_signature(token: &str, body: &[u8]) -> AppResult<String> {
    let secret = Sha256::digest(token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| AppError::Signature(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies the `crypto-pay-api-signature` header against the raw request body
pub fn verify_cryptobot_signature(token: &str, body: &[u8], signature: Option<&str>) -> AppResult<()> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Signature("missing signature".to_string()))?;
    let expected = hex::decode(signature).map_err(|_| AppError::Signature("signature is not hex".to_string()))?;

    let secret = Sha256::digest(token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| AppError::Signature(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::Signature("invalid signature".to_string()))
}

/// Compares a shared webhook token in constant time
pub fn verify_shared_token(expected: &str, provided: Option<&str>) -> AppResult<()> {
    let provided = provided.ok_or_else(|| AppError::Signature("missing token".to_string()))?;
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    let diff = a
        .iter()
        .zip(b.iter())
        .fold(a.len() ^ b.len(), |acc, (x, y)| acc | usize::from(x ^ y));
    if diff == 0 {
        Ok(())
    } else {
        Err(AppError::Signature("invalid token".to_string()))
    }
}
