//! Base64 data URLs
//!
//! Binary payloads travel as `data:<mime>;base64,<payload>` text in export
//! files and in legacy sessions.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::storage::{StoreError, StoreResult};

/// Fallback MIME type for payloads we cannot identify
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess an image MIME type from magic bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}

/// Encode bytes as a base64 data URL with a sniffed MIME type
pub fn encode(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
}

/// Decode a base64 data URL back to bytes
pub fn decode(url: &str) -> StoreResult<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| StoreError::Validation("asset data is not a data URL".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StoreError::Validation("data URL has no payload".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(StoreError::Validation(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| StoreError::Validation(format!("invalid base64 payload: {}", e)))
}
