//! HTTP capability used to talk to the provider
//!
//! The core never calls `reqwest` directly. Everything goes through the
//! [`HttpClient`] trait so hosts can inject their own transport (and tests can
//! use a mock server). [`CachingHttpClient`] layers a greedy TTL cache for GET
//! responses on top of any client; POST requests always pass through.
//!
//! Timeout policy is the responsibility of the client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::HttpError;

/// Default TTL for cached provider responses (1 hour)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A successful HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code (always 2xx)
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP basic-auth credentials
#[derive(Clone)]
pub struct BasicAuth {
    /// User name (client id)
    pub username: String,
    /// Password (client secret)
    pub password: SecretString,
}

// Manual Debug impl to keep the secret out of logs
impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Minimal HTTP capability needed by the provider client
///
/// Implementations must treat non-2xx responses as [`HttpError::Status`].
#[async_trait]
pub trait HttpClient: Send + Sync + fmt::Debug {
    /// Issue a GET request
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;

    /// Issue a form-encoded POST request with basic auth
    async fn post_form(
        &self,
        url: &str,
        auth: &BasicAuth,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client with a 10 second timeout and redirects disabled
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialised
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Transport {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn finish(url: &str, response: reqwest::Response) -> Result<HttpResponse, HttpError> {
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(HttpResponse::new(status.as_u16(), headers, body))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .get(url)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Self::finish(url, response).await
    }

    async fn post_form(
        &self,
        url: &str,
        auth: &BasicAuth,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .post(url)
            .header(http::header::ACCEPT, "application/json")
            .basic_auth(&auth.username, Some(auth.password.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Self::finish(url, response).await
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: HttpResponse,
    expires_at: SystemTime,
}

/// Shared store for cached GET responses
///
/// Create one per process and hand it to every [`CachingHttpClient`] so the
/// cache outlives individual provider clients.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, url: &str) -> Option<HttpResponse> {
        let entry = self.entries.get(url)?;
        if SystemTime::now() < entry.expires_at {
            Some(entry.response.clone())
        } else {
            drop(entry);
            self.entries.remove(url);
            None
        }
    }

    fn insert(&self, url: &str, response: HttpResponse, ttl: Duration) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                response,
                expires_at: SystemTime::now() + ttl,
            },
        );
    }

    /// Number of stored entries (expired ones included until next lookup)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Greedy TTL cache in front of another [`HttpClient`]
///
/// Successful GET responses are stored for the configured TTL regardless of
/// the server's cache headers. Failures are never cached.
#[derive(Debug, Clone)]
pub struct CachingHttpClient {
    inner: Arc<dyn HttpClient>,
    cache: Arc<ResponseCache>,
    ttl: Duration,
}

impl CachingHttpClient {
    /// Wrap `inner` with a private cache and the default TTL
    pub fn new(inner: Arc<dyn HttpClient>) -> Self {
        Self::with_cache(inner, Arc::new(ResponseCache::new()), DEFAULT_CACHE_TTL)
    }

    /// Wrap `inner` with a shared cache
    pub fn with_cache(inner: Arc<dyn HttpClient>, cache: Arc<ResponseCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    /// The backing cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

#[async_trait]
impl HttpClient for CachingHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        if let Some(cached) = self.cache.get(url) {
            debug!(url = %url, "Using cached provider response");
            return Ok(cached);
        }

        let response = self.inner.get(url).await?;
        self.cache.insert(url, response.clone(), self.ttl);
        Ok(response)
    }

    async fn post_form(
        &self,
        url: &str,
        auth: &BasicAuth,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        self.inner.post_form(url, auth, form).await
    }
}
