//! JSON metadata encoding for ZIP comment fields.
//!
//! Both the per-entry comment in the central directory and the
//! end-of-central-directory comment are prefixed by a 16-bit length, so an
//! encoded value can be at most [`MAX_COMMENT_LEN`] bytes.
//!
//! Encoding is canonical: compact JSON with object keys in sorted order.
//! Encoding the same value twice always yields the same bytes, which keeps
//! repeated rewrites byte-identical.

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::MetadataError;

/// Maximum length of a ZIP comment field in bytes.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// Encodes a value into comment bytes.
///
/// # Errors
///
/// Returns [`MetadataError::NotSerializable`] if serde cannot represent the
/// value as JSON, and [`MetadataError::TooLarge`] if the encoded form is
/// longer than [`MAX_COMMENT_LEN`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use zipper_core::metadata::codec::encode;
///
/// let bytes = encode(&json!({"type": "text", "author": "me"}))?;
/// assert_eq!(bytes, br#"{"author":"me","type":"text"}"#);
/// # Ok::<(), zipper_core::MetadataError>(())
/// ```
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, MetadataError> {
    let value =
        serde_json::to_value(value).map_err(|e| MetadataError::NotSerializable(e.to_string()))?;
    let value = canonicalize(value);
    let bytes =
        serde_json::to_vec(&value).map_err(|e| MetadataError::NotSerializable(e.to_string()))?;

    if bytes.len() > MAX_COMMENT_LEN {
        return Err(MetadataError::TooLarge {
            size: bytes.len(),
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(bytes)
}

/// Rebuilds every object with its keys in sorted order.
///
/// `serde_json` keeps insertion order when its `preserve_order` feature is
/// enabled anywhere in the dependency graph, so sorting is done here.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Encodes optional metadata; `None` becomes an empty comment.
pub fn encode_optional(value: Option<&Value>) -> Result<Vec<u8>, MetadataError> {
    value.map_or_else(|| Ok(Vec::new()), encode)
}

/// Decodes comment bytes into metadata.
///
/// An empty comment means "no metadata" and decodes to `Ok(None)`, which is
/// distinct from a stored `{}` or `null`.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidUtf8`] if the bytes are not UTF-8 and
/// [`MetadataError::Malformed`] if the text is not valid JSON.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use zipper_core::metadata::codec::decode;
///
/// assert_eq!(decode(b"")?, None);
/// assert_eq!(decode(b"{}")?, Some(json!({})));
/// assert!(decode(b"not json").is_err());
/// # Ok::<(), zipper_core::MetadataError>(())
/// ```
pub fn decode(bytes: &[u8]) -> Result<Option<Value>, MetadataError> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let text = std::str::from_utf8(bytes).map_err(|e| MetadataError::InvalidUtf8 {
        valid_up_to: e.valid_up_to(),
    })?;

    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| MetadataError::Malformed {
            line: e.line(),
            column: e.column(),
            reason: e.to_string(),
        })
}

/// Merges top-level keys of `patch` into `existing`.
///
/// Keys present in `patch` overwrite those in `existing`. If `existing` is
/// absent or not an object, the result is the patch itself.
#[must_use]
pub fn merge(existing: Option<Value>, patch: &Map<String, Value>) -> Value {
    match existing {
        Some(Value::Object(mut map)) => {
            for (key, value) in patch {
                map.insert(key.clone(), value.clone());
            }
            Value::Object(map)
        }
        _ => Value::Object(patch.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_encode_is_compact_and_sorted() {
        let bytes = encode(&json!({"b": 1, "a": [true, null]})).unwrap();
        assert_eq!(bytes, br#"{"a":[true,null],"b":1}"#);
    }

    #[test]
    fn test_encode_struct_is_canonical() {
        #[derive(Serialize)]
        struct Info {
            zeta: u8,
            alpha: &'static str,
        }

        let bytes = encode(&Info {
            zeta: 1,
            alpha: "x",
        })
        .unwrap();
        assert_eq!(bytes, br#"{"alpha":"x","zeta":1}"#);
    }

    #[test]
    fn test_encode_non_string_keys_fails() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");
        let err = encode(&map).unwrap_err();
        assert!(matches!(err, MetadataError::NotSerializable(_)));
        assert!(err.is_encoding_error());
    }

    #[test]
    fn test_encode_keeps_utf8() {
        let bytes = encode(&json!({"name": "café"})).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"{"name":"café"}"#);
    }

    #[test]
    fn test_encode_size_boundary() {
        // `"` + payload + `"` must land exactly on the limit.
        let exact = "x".repeat(MAX_COMMENT_LEN - 2);
        assert_eq!(encode(&json!(exact)).unwrap().len(), MAX_COMMENT_LEN);

        let over = "x".repeat(MAX_COMMENT_LEN - 1);
        let err = encode(&json!(over)).unwrap_err();
        assert_eq!(
            err,
            MetadataError::TooLarge {
                size: MAX_COMMENT_LEN + 1,
                max: MAX_COMMENT_LEN,
            }
        );
    }

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(decode(b"").unwrap(), None);
    }

    #[test]
    fn test_decode_distinguishes_null_and_empty_object() {
        assert_eq!(decode(b"null").unwrap(), Some(Value::Null));
        assert_eq!(decode(b"{}").unwrap(), Some(json!({})));
    }

    #[test]
    fn test_decode_accepts_non_object_values() {
        assert_eq!(decode(b"[1,2]").unwrap(), Some(json!([1, 2])));
        assert_eq!(decode(b"\"plain\"").unwrap(), Some(json!("plain")));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode(&[b'{', 0xFF, b'}']).unwrap_err();
        assert_eq!(err, MetadataError::InvalidUtf8 { valid_up_to: 1 });
        assert!(err.is_decoding_error());
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode(b"{invalid}").unwrap_err();
        assert!(err.is_malformed());
        match err {
            MetadataError::Malformed { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        let decoded = decode(b"{ \"type\" : \"text\" }\n").unwrap();
        assert_eq!(decoded, Some(json!({"type": "text"})));
    }

    #[test]
    fn test_encode_optional_none_is_empty() {
        assert!(encode_optional(None).unwrap().is_empty());
        assert_eq!(encode_optional(Some(&json!({}))).unwrap(), b"{}");
    }

    #[test]
    fn test_merge_into_object() {
        let patch = json!({"reviewed": true, "type": "doc"});
        let merged = merge(
            Some(json!({"type": "text", "size": 3})),
            patch.as_object().unwrap(),
        );
        assert_eq!(merged, json!({"type": "doc", "size": 3, "reviewed": true}));
    }

    #[test]
    fn test_merge_replaces_non_object() {
        let patch = json!({"a": 1});
        assert_eq!(merge(None, patch.as_object().unwrap()), json!({"a": 1}));
        assert_eq!(
            merge(Some(json!([1, 2])), patch.as_object().unwrap()),
            json!({"a": 1})
        );
    }
}
