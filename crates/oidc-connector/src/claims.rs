//! Claim sets and scope extraction
//!
//! A [`ClaimSet`] is the flat JSON object carried by a token or returned by
//! introspection. Insertion order is preserved so the serialized form used for
//! session cache keys is stable.

use serde_json::{Map, Value};

/// Token claims, name to JSON value
pub type ClaimSet = Map<String, Value>;

/// Scopes granted by a claim set
///
/// Reads `scope`, falling back to `scp`. Either may be a space-delimited
/// string or a list of strings. Returns an empty list when neither is present.
pub fn extract_scopes(claims: &ClaimSet) -> Vec<String> {
    let value = claims.get("scope").or_else(|| claims.get("scp"));

    match value {
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether a token came from a client-credentials grant
///
/// Keycloak issues user tokens with the `openid` scope and service-account
/// tokens without it.
pub fn is_service_account_token(claims: &ClaimSet) -> bool {
    !extract_scopes(claims).iter().any(|scope| scope == "openid")
}

/// String claim value, if present and a string
pub fn string_claim<'a>(claims: &'a ClaimSet, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

/// Integer claim value, if present and numeric
///
/// Floating point values are truncated.
pub fn int_claim(claims: &ClaimSet, name: &str) -> Option<i64> {
    match claims.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}
