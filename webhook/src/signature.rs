//! Typeform webhook signature check.
//!
//! Typeform signs the raw request body with HMAC-SHA256 using the secret set on
//! the webhook and sends `Typeform-Signature: sha256=<base64 digest>`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "typeform-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("missing Typeform-Signature header")]
    Missing,
    #[error("signature header is not of the form sha256=<base64>")]
    Malformed,
    #[error("signature does not match body")]
    Mismatch,
}

/// Signature header value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks `header` against the body digest in constant time.
pub fn verify(secret: &str, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let encoded = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::Malformed)?;
    let expected = STANDARD
        .decode(encoded)
        .map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
