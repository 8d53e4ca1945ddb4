//! Provider client
//!
//! Talks to the OpenID Connect provider: discovery, key sets, provider time,
//! client-credentials tokens and token introspection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::metadata::ProviderMetadata;
use crate::claims::ClaimSet;
use crate::config::OidcConfig;
use crate::error::{DiscoveryError, DiscoveryResult, HttpError, ProviderError, ProviderResult};
use crate::http::{BasicAuth, CachingHttpClient, HttpClient, ReqwestHttpClient, ResponseCache};

/// Well-known discovery path appended to the server URL
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Client for one OpenID Connect provider
///
/// Discovery metadata is fetched once and kept for the lifetime of the
/// instance. Key sets are fetched on every call but go through the shared
/// response cache, so a rotated key becomes visible once the cache entry
/// expires.
///
/// # Example
///
/// ```rust,no_run
/// use oidc_connector::config::OidcConfig;
/// use oidc_connector::provider::ProviderClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OidcConfig::new("https://sso.example.com/realms/acme");
/// let provider = ProviderClient::new(&config)?;
///
/// let metadata = provider.provider_config().await?;
/// println!("issuer: {}", metadata.issuer);
/// # Ok(())
/// # }
/// ```
pub struct ProviderClient {
    server_url: String,
    http: Arc<dyn HttpClient>,
    cached: CachingHttpClient,
    credentials: Option<BasicAuth>,
    metadata: OnceCell<Arc<ProviderMetadata>>,
}

// Manual Debug impl to keep credentials out of logs
impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("server_url", &self.server_url)
            .field("credentials", &self.credentials)
            .field("metadata", &self.metadata.get().map(|_| "<cached>"))
            .finish()
    }
}

impl ProviderClient {
    /// Create a client using `reqwest` and a private response cache
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &OidcConfig) -> Result<Self, HttpError> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
        Ok(Self::with_http_client(config, http))
    }

    /// Create a client on top of an injected HTTP capability
    pub fn with_http_client(config: &OidcConfig, http: Arc<dyn HttpClient>) -> Self {
        let credentials = match (
            &config.remote_validation_id,
            &config.remote_validation_secret,
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.expose_secret().is_empty() => {
                Some(BasicAuth {
                    username: id.clone(),
                    password: secret.clone(),
                })
            }
            _ => None,
        };

        Self {
            server_url: config.server_url.clone(),
            cached: CachingHttpClient::new(Arc::clone(&http)),
            http,
            credentials,
            metadata: OnceCell::new(),
        }
    }

    /// Share a response cache with other clients
    ///
    /// `ttl` bounds how long key sets are served from the cache; rotated keys
    /// become visible once it elapses. Metadata already memoized by this
    /// instance is kept.
    pub fn with_response_cache(mut self, cache: Arc<ResponseCache>, ttl: Duration) -> Self {
        self.cached = CachingHttpClient::with_cache(Arc::clone(&self.http), cache, ttl);
        self
    }

    /// Provider base URL
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn discovery_url(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), DISCOVERY_PATH)
    }

    /// Provider metadata, fetched on first use
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Config`] if the document cannot be fetched or
    /// parsed. A failed fetch is not memoized.
    pub async fn provider_config(&self) -> DiscoveryResult<Arc<ProviderMetadata>> {
        let metadata = self
            .metadata
            .get_or_try_init(|| async {
                let url = self.discovery_url();
                debug!(discovery_url = %url, "Fetching OpenID Connect discovery document");

                let response = self
                    .cached
                    .get(&url)
                    .await
                    .map_err(|e| DiscoveryError::Config(e.to_string()))?;
                let metadata = ProviderMetadata::from_slice(&response.body)?;

                info!(
                    issuer = %metadata.issuer,
                    jwks_uri = ?metadata.jwks_uri,
                    "Discovered provider configuration"
                );
                Ok::<_, DiscoveryError>(Arc::new(metadata))
            })
            .await?;

        Ok(Arc::clone(metadata))
    }

    /// The provider's current key set
    ///
    /// Keys that cannot be parsed as JWKs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if discovery fails, no `jwks_uri` is
    /// advertised, or the key set cannot be fetched or is not a JSON object
    /// with a `keys` list
    pub async fn jwks(&self) -> DiscoveryResult<JwkSet> {
        let metadata = self.provider_config().await?;
        let jwks_uri = metadata
            .jwks_uri
            .as_deref()
            .ok_or_else(|| DiscoveryError::Keys("no jwks_uri in provider metadata".to_string()))?;

        let response = self
            .cached
            .get(jwks_uri)
            .await
            .map_err(|e| DiscoveryError::Keys(e.to_string()))?;

        let document: Value = serde_json::from_slice(&response.body)
            .map_err(|e| DiscoveryError::Keys(format!("invalid json: {e}")))?;
        let raw_keys = document
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| DiscoveryError::Keys("invalid json: missing 'keys'".to_string()))?;

        let keys: Vec<Jwk> = raw_keys
            .iter()
            .filter_map(|raw| match serde_json::from_value::<Jwk>(raw.clone()) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    debug!(
                        kid = ?raw.get("kid").and_then(serde_json::Value::as_str),
                        error = %e,
                        "Skipping unsupported JWK"
                    );
                    None
                }
            })
            .collect();

        debug!(jwks_uri = %jwks_uri, key_count = keys.len(), "Loaded JWKS");
        Ok(JwkSet { keys })
    }

    /// Current time according to the provider's `Date` header
    ///
    /// The request bypasses the response cache.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Time`] if the request fails or the header is
    /// missing or malformed
    pub async fn provider_time(&self) -> DiscoveryResult<DateTime<Utc>> {
        let response = self
            .http
            .get(&self.server_url)
            .await
            .map_err(|e| DiscoveryError::Time(e.to_string()))?;

        let date = response
            .header(http::header::DATE.as_str())
            .ok_or_else(|| DiscoveryError::Time("no Date header".to_string()))?;

        DateTime::parse_from_rfc2822(date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| DiscoveryError::Time(format!("invalid Date header '{date}': {e}")))
    }

    /// Absolute difference between provider time and local time
    ///
    /// Hosts compare this against the validation leeway in health checks.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Time`] if the provider time is unavailable
    pub async fn clock_drift(&self) -> DiscoveryResult<TimeDelta> {
        let provider_now = self.provider_time().await?;
        Ok((provider_now - Utc::now()).abs())
    }

    fn credentials(&self) -> ProviderResult<&BasicAuth> {
        self.credentials
            .as_ref()
            .ok_or(ProviderError::MissingCredentials)
    }

    /// Obtain an access token with the client-credentials grant
    ///
    /// Uses the remote validation client id and secret.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if discovery fails, no token endpoint is
    /// advertised, credentials are not configured, the call fails, or the
    /// response has no `access_token`
    pub async fn create_client_credentials_token(&self) -> ProviderResult<String> {
        let metadata = self.provider_config().await?;
        let endpoint = metadata
            .token_endpoint
            .as_deref()
            .ok_or(ProviderError::MissingEndpoint("token"))?;
        let auth = self.credentials()?;

        let response = self
            .http
            .post_form(endpoint, auth, &[("grant_type", "client_credentials")])
            .await
            .map_err(|source| ProviderError::Http {
                operation: "Creating a token",
                source,
            })?;

        let body: Value =
            serde_json::from_slice(&response.body).map_err(|e| ProviderError::InvalidResponse {
                operation: "Token",
                reason: format!("invalid json: {e}"),
            })?;

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse {
                operation: "Token",
                reason: "missing access_token".to_string(),
            })
    }

    /// Introspect a token (RFC 7662)
    ///
    /// The caller decides what to do with `active`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if discovery fails, no introspection endpoint
    /// is advertised, credentials are not configured, the call fails, or the
    /// response is not a JSON object
    pub async fn introspect(&self, token: &str) -> ProviderResult<ClaimSet> {
        let metadata = self.provider_config().await?;
        let endpoint = metadata
            .introspection_endpoint
            .as_deref()
            .ok_or(ProviderError::MissingEndpoint("introspection"))?;
        let auth = self.credentials()?;

        let response = self
            .http
            .post_form(endpoint, auth, &[("token", token)])
            .await
            .map_err(|source| {
                warn!(endpoint = %endpoint, error = %source, "Token introspection request failed");
                ProviderError::Http {
                    operation: "Token introspection",
                    source,
                }
            })?;

        let claims: ClaimSet =
            serde_json::from_slice(&response.body).map_err(|e| ProviderError::InvalidResponse {
                operation: "Token introspection",
                reason: format!("invalid json: {e}"),
            })?;

        debug!(
            active = ?claims.get("active"),
            "Token introspection completed"
        );
        Ok(claims)
    }
}
