//! Identifier codec for URL path segments.
//!
//! AAS identifiers are opaque UTF-8 strings up to 2000 bytes. Whenever one
//! is embedded in a URL path it is Base64URL-encoded without padding
//! (IDTA-01002 §4.3.1). Decoding reconstructs the padding from the input
//! length; a length of 1 mod 4 can never be produced by a valid encoder.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::errors::{TitanError, TitanResult};

/// Maximum identifier length in bytes (IDTA-01001 metamodel limit).
pub const MAX_IDENTIFIER_LEN: usize = 2000;

/// Encode a raw identifier for use as a URL path segment.
///
/// Empty input maps to empty output.
pub fn encode_id(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// Decode a Base64URL path segment back into the raw identifier.
///
/// Rejects empty input, characters outside the Base64URL alphabet, lengths
/// that no unpadded encoding can produce, and byte sequences that are not
/// valid UTF-8.
pub fn decode_id(encoded: &str) -> TitanResult<String> {
    if encoded.is_empty() {
        return Err(TitanError::invalid_base64url("identifier segment is empty"));
    }
    if encoded.len() % 4 == 1 {
        return Err(TitanError::invalid_base64url(format!(
            "invalid base64url length {}",
            encoded.len()
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(|e| TitanError::invalid_base64url(format!("malformed base64url: {e}")))?;

    String::from_utf8(bytes)
        .map_err(|_| TitanError::invalid_base64url("decoded identifier is not valid UTF-8"))
}
