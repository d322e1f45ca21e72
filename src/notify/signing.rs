//! HMAC-SHA256 request signing

use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header carrying the signing timestamp in milliseconds
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Sign `body` followed by `timestamp_millis`, returning a hex digest
pub fn sign_body(secret: &str, body: &str, timestamp_millis: i64) -> Result<String> {
    // Reject empty secrets explicitly
    if secret.is_empty() {
        return Err(Error::Config("Invalid signing secret: cannot be empty".to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid signing secret: {}", e)))?;
    mac.update(body.as_bytes());
    mac.update(timestamp_millis.to_string().as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
