//! Canonical JSON encoding
//!
//! Deterministic serialization used for signing payloads and key-id
//! derivation: object members in lexicographic code-point order, minimal
//! string escapes, integers only, no whitespace. Decoding is ordinary
//! `serde_json`; any valid JSON is accepted and re-encodes to exactly one
//! byte sequence.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while canonicalizing a JSON value
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The value contains a number with no exact integer representation
    #[error("number {value} has no canonical integer representation")]
    UnrepresentableNumber { value: f64 },

    /// The value could not be converted into a JSON tree at all
    #[error("value is not representable as JSON")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize any value through `serde_json` and canonically encode the result.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let tree = serde_json::to_value(value)?;
    encode(&tree)
}

/// Canonically encode a decoded JSON tree.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

// Largest f64 range in which every integral value is exact.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else {
                // serde_json numbers outside i64/u64 are finite floats.
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                    out.extend_from_slice((f as i64).to_string().as_bytes());
                } else {
                    return Err(CanonicalError::UnrepresentableNumber { value: f });
                }
            }
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // Lexicographic member order; String comparison is code-point order.
            let mut names: Vec<&String> = map.keys().collect();
            names.sort_unstable();

            out.push(b'{');
            for (i, name) in names.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(name, out);
                out.push(b':');
                write_value(&map[name.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

// Minimal escape set: quote, backslash, and control characters. Everything
// else is emitted as raw UTF-8.
fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn members_sorted_by_code_point() {
        let v = json!({"zeta": 1, "alpha": 2, "Beta": 3});
        let out = encode(&v).unwrap();
        // Uppercase sorts before lowercase in code-point order.
        assert_eq!(out, br#"{"Beta":3,"alpha":2,"zeta":1}"#);
    }

    #[test]
    fn nested_structures() {
        let v = json!({"b": [1, {"y": null, "x": true}], "a": "s"});
        let out = encode(&v).unwrap();
        assert_eq!(out, br#"{"a":"s","b":[1,{"x":true,"y":null}]}"#);
    }

    #[test]
    fn minimal_string_escapes() {
        let v = json!("quote \" slash \\ newline \n end");
        let out = encode(&v).unwrap();
        assert_eq!(out, b"\"quote \\\" slash \\\\ newline \\u000a end\"".as_slice());
    }

    #[test]
    fn unicode_passes_through_unescaped() {
        let v = json!("héllo 世界");
        let out = encode(&v).unwrap();
        assert_eq!(out, "\"héllo 世界\"".as_bytes());
    }

    #[test]
    fn integral_float_becomes_integer() {
        let v = json!(4.0);
        assert_eq!(encode(&v).unwrap(), b"4");
    }

    #[test]
    fn fractional_float_is_rejected() {
        let v = json!(4.5);
        assert!(matches!(
            encode(&v),
            Err(CanonicalError::UnrepresentableNumber { .. })
        ));
    }

    #[test]
    fn reencoding_decoded_output_is_stable() {
        let v = json!({"m": {"k2": [1, 2, 3], "k1": "välue"}, "n": -7});
        let first = encode(&v).unwrap();
        let decoded: Value = serde_json::from_slice(&first).unwrap();
        let second = encode(&decoded).unwrap();
        assert_eq!(first, second);
    }
}
