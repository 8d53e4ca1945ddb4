//! Audience policy

use serde_json::Value;

use crate::claims::ClaimSet;
use crate::error::{TokenValidationError, ValidationResult};

/// Check that the token was issued for `required`
///
/// `aud` may be a string or a list of strings; matching is exact.
///
/// # Errors
///
/// Returns [`TokenValidationError::BadAudience`] if `aud` is missing, of
/// another type, or does not contain `required`
pub fn check_audience(claims: &ClaimSet, required: &str) -> ValidationResult<()> {
    let matches = match claims.get("aud") {
        Some(Value::String(aud)) => aud == required,
        Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(required)),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(TokenValidationError::BadAudience)
    }
}
