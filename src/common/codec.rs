//! Primitive codecs: lenient base64 and percent-encoding helpers
//!
//! Subscription payloads arrive with every base64 defect seen in the
//! wild: missing padding, URL-safe alphabet, stray whitespace. The
//! decoders here repair what can be repaired and fail cleanly on the
//! rest.

use crate::{Error, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;

/// Decode base64 leniently: strip whitespace, fold the URL-safe
/// alphabet into the standard one, re-pad to a multiple of 4, then try
/// the standard engine with a no-pad fallback.
pub fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    if cleaned.is_empty() {
        return Err(Error::decode("empty base64 payload"));
    }

    let trimmed = cleaned.trim_end_matches('=');
    let padded = match trimmed.len() % 4 {
        0 => trimmed.to_string(),
        1 => return Err(Error::decode("base64 length invalid after repair")),
        rem => format!("{}{}", trimmed, "=".repeat(4 - rem)),
    };

    STANDARD
        .decode(&padded)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| Error::decode(format!("invalid base64: {}", e)))
}

/// Lenient base64 to UTF-8 string.
pub fn decode_base64_text(input: &str) -> Result<String> {
    let bytes = decode_base64(input)?;
    String::from_utf8(bytes).map_err(|e| Error::decode(format!("invalid UTF-8: {}", e)))
}

/// Decode a secondary base64 field; any failure degrades to an empty
/// string rather than rejecting the record (SSR `obfsparam` etc.).
pub fn decode_base64_or_empty(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    decode_base64_text(input).unwrap_or_default()
}

/// Standard base64 encoding with padding (vmess payloads).
pub fn encode_base64(input: &[u8]) -> String {
    STANDARD.encode(input)
}

/// URL-safe base64 without padding (SIP002 userinfo, SSR payloads).
pub fn encode_base64_url(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Percent-decode, tolerating bare `%` sequences by returning the
/// input unchanged on error.
pub fn percent_decode(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(cow) => cow.into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Percent-encode a display name for a URI fragment.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}
