//! Connector Configuration Types
//!
//! Hosts load [`OidcConfig`] from wherever they keep settings (files,
//! environment) and pass it in. Nothing here reads the environment itself.
//!
//! ```rust
//! use oidc_connector::config::{AttributeConfig, OidcConfig};
//!
//! let config = OidcConfig::new("https://sso.example.com/realms/acme")
//!     .with_required_audience("orders-api")
//!     .with_attribute(AttributeConfig::scopes("can_read", ["orders:read", "orders:admin"]));
//!
//! config.validate()?;
//! # Ok::<(), oidc_connector::error::ConfigError>(())
//! ```

use secrecy::SecretString;
use serde::Deserialize;

use crate::attributes::AttributeProvider;
use crate::error::ConfigError;

/// Default leeway for local time checks, in seconds
pub const DEFAULT_LEEWAY_SECS: u64 = 120;

/// Connector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Provider base URL (for Keycloak, the realm URL)
    pub server_url: String,

    /// Audience every accepted token must carry; no check when unset
    #[serde(default)]
    pub required_audience: Option<String>,

    /// Clock tolerance for local `iat`/`nbf`/`exp` checks, in seconds
    #[serde(default = "default_leeway")]
    pub local_validation_leeway: u64,

    /// Validate through the introspection endpoint instead of locally
    #[serde(default)]
    pub remote_validation: bool,

    /// Client id used for introspection and client-credentials calls
    #[serde(default)]
    pub remote_validation_id: Option<String>,

    /// Client secret paired with `remote_validation_id`
    #[serde(default)]
    pub remote_validation_secret: Option<SecretString>,

    /// Claims tried in order to find the user identifier
    #[serde(default = "default_user_identifier_claims")]
    pub user_identifier_claims: Vec<String>,

    /// Authorization attributes derived from scopes or claims
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,

    /// Populate user roles from token scopes
    #[serde(default)]
    pub set_roles_from_scopes: bool,

    /// Secret mixed into logging ids so session ids are not exposed
    #[serde(default = "default_app_secret")]
    pub app_secret: SecretString,
}

fn default_leeway() -> u64 {
    DEFAULT_LEEWAY_SECS
}

fn default_user_identifier_claims() -> Vec<String> {
    vec!["preferred_username".to_string(), "username".to_string()]
}

fn default_app_secret() -> SecretString {
    SecretString::new(String::new())
}

/// One configured attribute rule
///
/// Exactly one of `scopes` and `claim` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttributeConfig {
    /// Attribute name exposed to the host
    pub name: String,

    /// Grant the attribute when any of these scopes is present
    #[serde(default)]
    pub scopes: Option<Vec<String>>,

    /// Pass this claim's value through as the attribute
    #[serde(default)]
    pub claim: Option<String>,
}

impl AttributeConfig {
    /// Scope-based attribute
    pub fn scopes<I, S>(name: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            scopes: Some(scopes.into_iter().map(Into::into).collect()),
            claim: None,
        }
    }

    /// Claim passthrough attribute
    pub fn claim(name: impl Into<String>, claim: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: None,
            claim: Some(claim.into()),
        }
    }
}

impl OidcConfig {
    /// Create a configuration with defaults for everything but the server URL
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            required_audience: None,
            local_validation_leeway: DEFAULT_LEEWAY_SECS,
            remote_validation: false,
            remote_validation_id: None,
            remote_validation_secret: None,
            user_identifier_claims: default_user_identifier_claims(),
            attributes: Vec::new(),
            set_roles_from_scopes: false,
            app_secret: default_app_secret(),
        }
    }

    /// Require tokens to carry this audience
    pub fn with_required_audience(mut self, audience: impl Into<String>) -> Self {
        self.required_audience = Some(audience.into());
        self
    }

    /// Set the local validation leeway in seconds
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.local_validation_leeway = seconds;
        self
    }

    /// Switch to introspection with the given client credentials
    pub fn with_remote_validation(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.remote_validation = true;
        self.remote_validation_id = Some(client_id.into());
        self.remote_validation_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set the client credentials without enabling remote validation
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.remote_validation_id = Some(client_id.into());
        self.remote_validation_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Replace the user identifier claim list
    pub fn with_user_identifier_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_identifier_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Append an attribute rule
    pub fn with_attribute(mut self, attribute: AttributeConfig) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Derive roles from token scopes
    pub fn with_roles_from_scopes(mut self, enabled: bool) -> Self {
        self.set_roles_from_scopes = enabled;
        self
    }

    /// Set the logging id secret
    pub fn with_app_secret(mut self, secret: impl Into<String>) -> Self {
        self.app_secret = SecretString::new(secret.into());
        self
    }

    /// Audience tokens must carry; an empty value means none is required
    pub fn effective_audience(&self) -> Option<&str> {
        self.required_audience
            .as_deref()
            .filter(|audience| !audience.is_empty())
    }

    /// Check the configuration before use
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the server URL is missing or not an
    /// absolute http(s) URL, if no user identifier claim is configured, or if
    /// an attribute rule is malformed or duplicated
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Missing("server_url"));
        }

        let parsed = url::Url::parse(&self.server_url).map_err(|e| ConfigError::Invalid {
            field: "server_url",
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "server_url",
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.user_identifier_claims.is_empty() {
            return Err(ConfigError::Missing("user_identifier_claims"));
        }

        AttributeProvider::from_config(&self.attributes)?;

        Ok(())
    }
}
