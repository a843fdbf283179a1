//! Decoding of extension request bodies.
//!
//! Deployed clients are loose about types: ids arrive as numbers or numeric
//! strings, and `months` may be a number, a string, or even a boolean. The
//! rules here accept those shapes and reduce everything else to one of the
//! `ExtensionError` input variants.

use serde_json::{Map, Value};

use crate::extension::ExtensionPeriod;
use crate::server::api_error::{
    ExtensionError, MSG_INVALID_ID, MSG_INVALID_JSON, MSG_MISSING_PARAMS,
};

/// A decoded and validated extension request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendExpiryRequest {
    pub id: i64,
    pub months: ExtensionPeriod,
}

/// Parse a raw request body.
///
/// # Errors
/// - `InvalidInput` with the invalid-JSON message when the body does not parse
///   or is an empty/false-like JSON value
/// - `InvalidInput` with the missing-parameters message when `id` or `months`
///   is absent or null, or when `id` is a false-like value such as `0` or `"0"`
/// - `InvalidPeriod` when `months` does not reduce to an allowed period
/// - `InvalidInput` with the invalid-id message when `id` is not an integer
pub fn parse_extend_request(body: &[u8]) -> Result<ExtendExpiryRequest, ExtensionError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| ExtensionError::InvalidInput(MSG_INVALID_JSON))?;

    if is_blank(&value) {
        return Err(ExtensionError::InvalidInput(MSG_INVALID_JSON));
    }

    let empty = Map::new();
    let fields = value.as_object().unwrap_or(&empty);

    let raw_id = present(fields, "id").filter(|id| !is_blank(id));

    let (Some(raw_id), Some(raw_months)) = (raw_id, present(fields, "months")) else {
        return Err(ExtensionError::InvalidInput(MSG_MISSING_PARAMS));
    };

    let months = coerce_months(raw_months)
        .and_then(ExtensionPeriod::new)
        .ok_or(ExtensionError::InvalidPeriod)?;

    let id = coerce_id(raw_id).ok_or(ExtensionError::InvalidInput(MSG_INVALID_ID))?;

    Ok(ExtendExpiryRequest { id, months })
}

/// Values a client sends when it effectively sent nothing.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// A field that is present, non-null and not an empty string.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(other),
    }
}

fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reduce `months` to an integer, truncating fractions toward zero.
///
/// Strings with trailing garbage keep their leading integer (`"3abc"` is 3).
fn coerce_months(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                .or_else(|| leading_integer(s))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// The optionally signed run of digits at the start of `s`, if any.
fn leading_integer(s: &str) -> Option<i64> {
    let unsigned = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    let digits = unsigned.len() - unsigned.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let end = s.len() - unsigned.len() + digits;
    if digits == 0 {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

fn truncate(f: f64) -> Option<i64> {
    (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| f.trunc() as i64)
}
