//! Request-scoped user session
//!
//! [`Session`] holds the validated claims of the current request. All
//! derived values come from pure functions over a [`ClaimSet`], so they can
//! also be used without a session.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::claims::{self, ClaimSet};
use crate::config::OidcConfig;
use crate::error::SessionError;

const UNKNOWN: &str = "unknown";

/// First configured claim holding a non-empty string
pub fn user_identifier(claims: &ClaimSet, identifier_claims: &[String]) -> Option<String> {
    identifier_claims.iter().find_map(|name| {
        claims::string_claim(claims, name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn claim_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Privacy-preserving id tying together requests of one login session
///
/// `<client>-<hash>` where the hash is the first 6 hex digits of
/// `sha256(client.session.app_secret)`. The session is `session_state`, or
/// `jti` for service accounts. Missing parts become `unknown`.
pub fn logging_id(claims: Option<&ClaimSet>, app_secret: &str) -> String {
    let Some(claims) = claims else {
        return format!("{UNKNOWN}-{UNKNOWN}");
    };

    let client = claims
        .get("azp")
        .and_then(claim_text)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let session = claims
        .get("session_state")
        .and_then(claim_text)
        .or_else(|| claims.get("jti").and_then(claim_text));

    let user = match session {
        Some(session) => {
            let digest = Sha256::digest(format!("{client}.{session}.{app_secret}"));
            let hex = format!("{digest:x}");
            hex[..6].to_string()
        }
        None => UNKNOWN.to_string(),
    };

    format!("{client}-{user}")
}

/// Key identifying this exact claim set for `identifier`
///
/// Hex SHA-256 of `identifier + "." + JSON(claims)`.
pub fn cache_key(claims: &ClaimSet, identifier: Option<&str>) -> String {
    let json = Value::Object(claims.clone()).to_string();
    let digest = Sha256::digest(format!("{}.{json}", identifier.unwrap_or_default()));
    format!("{digest:x}")
}

/// Token lifetime in seconds, or -1 without `exp` and `iat`
pub fn session_ttl(claims: &ClaimSet) -> i64 {
    match (
        claims::int_claim(claims, "exp"),
        claims::int_claim(claims, "iat"),
    ) {
        (Some(exp), Some(iat)) => exp.saturating_sub(iat).max(0),
        _ => -1,
    }
}

/// Claims of the current request
///
/// Never share a session between requests.
#[derive(Debug, Clone)]
pub struct Session {
    claims: Option<ClaimSet>,
    identifier_claims: Arc<[String]>,
    app_secret: SecretString,
}

impl Session {
    /// Empty session using the configured identifier claims and app secret
    pub fn new(config: &OidcConfig) -> Self {
        Self::with_settings(
            config.user_identifier_claims.clone(),
            config.app_secret.clone(),
        )
    }

    /// Empty session with explicit settings
    pub fn with_settings(identifier_claims: Vec<String>, app_secret: SecretString) -> Self {
        Self {
            claims: None,
            identifier_claims: identifier_claims.into(),
            app_secret,
        }
    }

    /// Replace the session claims; `None` clears them
    pub fn set_token(&mut self, claims: Option<ClaimSet>) {
        self.claims = claims;
    }

    /// Current claims
    pub fn token(&self) -> Option<&ClaimSet> {
        self.claims.as_ref()
    }

    /// Whether claims are set
    pub fn has_token(&self) -> bool {
        self.claims.is_some()
    }

    fn require(&self) -> Result<&ClaimSet, SessionError> {
        self.claims.as_ref().ok_or(SessionError::NoToken)
    }

    /// User identifier, see [`user_identifier`]
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoToken`] if no claims are set
    pub fn user_identifier(&self) -> Result<Option<String>, SessionError> {
        Ok(user_identifier(self.require()?, &self.identifier_claims))
    }

    /// Granted scopes
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoToken`] if no claims are set
    pub fn scopes(&self) -> Result<Vec<String>, SessionError> {
        Ok(claims::extract_scopes(self.require()?))
    }

    /// Whether the token came from a client-credentials grant
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoToken`] if no claims are set
    pub fn is_service_account(&self) -> Result<bool, SessionError> {
        Ok(claims::is_service_account_token(self.require()?))
    }

    /// Logging id, see [`logging_id`]
    pub fn logging_id(&self) -> String {
        logging_id(self.claims.as_ref(), self.app_secret.expose_secret())
    }

    /// Cache key for data derived from this session
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoToken`] if no claims are set
    pub fn cache_key(&self) -> Result<String, SessionError> {
        let claims = self.require()?;
        let identifier = user_identifier(claims, &self.identifier_claims);
        Ok(cache_key(claims, identifier.as_deref()))
    }

    /// How long data derived from this session may be cached, in seconds
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoToken`] if no claims are set
    pub fn ttl(&self) -> Result<i64, SessionError> {
        Ok(session_ttl(self.require()?))
    }
}
