//! Canonical JSON bytes and ETag derivation.
//!
//! The canonical form is the single input to ETag computation and the
//! byte-identical blob stored next to every entity:
//!
//! - object keys sorted lexically by code point
//! - no insignificant whitespace
//! - `null`-valued object members dropped (optional-field omission);
//!   nulls inside arrays are significant and kept
//! - numbers via serde_json's itoa/ryu writers (integers literal, floats
//!   shortest round-trip)
//!
//! Canonicalization is total and idempotent:
//! `canon(parse(canon(x))) == canon(x)`.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{TitanError, TitanResult};

/// Produce the canonical byte form of a JSON document.
pub fn canonicalize(value: &Value) -> TitanResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Canonicalize and re-parse, yielding the normalized document tree
/// (nulls stripped, ready for storage as the indexable doc).
pub fn canonicalize_to_value(value: &Value) -> TitanResult<Value> {
    let bytes = canonicalize(value)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TitanError::internal_from("canonical bytes failed to re-parse", e))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> TitanResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(_) | Value::String(_) => {
            serde_json::to_writer(&mut *out, value)
                .map_err(|e| TitanError::internal_from("scalar serialization failed", e))?;
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)
                    .map_err(|e| TitanError::internal_from("key serialization failed", e))?;
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// ETag of an entity: hex of the first 16 bytes of SHA-256 over its
/// canonical bytes.
pub fn etag_hex(canonical_bytes: &[u8]) -> String {
    let digest = Sha256::digest(canonical_bytes);
    let mut etag = String::with_capacity(32);
    for byte in &digest[..16] {
        etag.push_str(&format!("{byte:02x}"));
    }
    etag
}

/// Strong-ETag header syntax: the hex value wrapped in double quotes.
pub fn strong_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_whitespace_free() {
        let doc = json!({"zeta": 1, "alpha": {"b": 2, "a": 1}});
        let bytes = canonicalize(&doc).unwrap();
        assert_eq!(bytes, br#"{"alpha":{"a":1,"b":2},"zeta":1}"#);
    }

    #[test]
    fn null_members_are_dropped_array_nulls_kept() {
        let doc = json!({"idShort": null, "id": "x", "values": [null, 1]});
        let bytes = canonicalize(&doc).unwrap();
        assert_eq!(bytes, br#"{"id":"x","values":[null,1]}"#);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{"modelType": "Property", "idShort": "p", "value": "1.5"}],
            "administration": null
        });
        let first = canonicalize(&doc).unwrap();
        let reparsed: serde_json::Value = serde_json::from_slice(&first).unwrap();
        let second = canonicalize(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn etag_is_32_hex_chars_and_stable() {
        let doc = json!({"id": "urn:example:aas:1"});
        let bytes = canonicalize(&doc).unwrap();
        let etag = etag_hex(&bytes);
        assert_eq!(etag.len(), 32);
        assert!(etag.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(etag, etag_hex(&canonicalize(&doc).unwrap()));
        assert_eq!(strong_etag(&etag), format!("\"{etag}\""));
    }

    #[test]
    fn distinct_documents_have_distinct_etags() {
        let a = canonicalize(&json!({"id": "a"})).unwrap();
        let b = canonicalize(&json!({"id": "b"})).unwrap();
        assert_ne!(etag_hex(&a), etag_hex(&b));
    }
}
