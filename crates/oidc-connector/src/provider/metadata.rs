//! OpenID Connect discovery document

use serde::Deserialize;

use crate::error::DiscoveryError;

/// Provider metadata from `/.well-known/openid-configuration`
///
/// Only the fields the connector uses are kept. Everything else in the
/// document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier, compared exactly against the `iss` claim
    pub issuer: String,

    /// JWK Set endpoint
    #[serde(default)]
    pub jwks_uri: Option<String>,

    /// Token endpoint
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// RFC 7662 introspection endpoint
    #[serde(default)]
    pub introspection_endpoint: Option<String>,

    /// Algorithms the introspection endpoint accepts; also the local allow-list
    #[serde(default)]
    pub introspection_endpoint_auth_signing_alg_values_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Parse a discovery document
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Config`] if the body is not JSON or lacks an
    /// `issuer`
    pub fn from_slice(body: &[u8]) -> Result<Self, DiscoveryError> {
        serde_json::from_slice(body)
            .map_err(|e| DiscoveryError::Config(format!("invalid discovery document: {e}")))
    }

    /// Algorithms advertised for the introspection endpoint
    pub fn introspection_signing_algorithms(&self) -> &[String] {
        &self.introspection_endpoint_auth_signing_alg_values_supported
    }
}
