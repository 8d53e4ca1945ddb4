//! Bearer token authentication entry point
//!
//! [`BearerAuthenticator`] is what a host calls per request: it pulls the
//! token out of the `Authorization` header, runs the configured validator,
//! applies the audience policy, populates the request [`Session`] and returns
//! a [`BearerUser`].
//!
//! Failures are reported as generic [`AuthenticationError`]s; the detailed
//! reason is only logged.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::HeaderMap;
//! use oidc_connector::authenticator::{BearerAuthenticator, unauthorized_response};
//! use oidc_connector::config::OidcConfig;
//! use oidc_connector::provider::ProviderClient;
//!
//! # async fn handle(headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OidcConfig::new("https://sso.example.com/realms/acme");
//! let provider = Arc::new(ProviderClient::new(&config)?);
//! let authenticator = BearerAuthenticator::new(&config, provider)?;
//!
//! if authenticator.supports(&headers) {
//!     let mut session = authenticator.new_session();
//!     match authenticator.authenticate(&headers, &mut session).await {
//!         Ok(user) => println!("user {} roles {:?}", user.user_identifier(), user.roles()),
//!         Err(e) => {
//!             let _response = unauthorized_response(&e);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode, header};
use moka::Expiry;
use moka::sync::Cache;
use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::attributes::AttributeProvider;
use crate::claims::{ClaimSet, extract_scopes};
use crate::config::OidcConfig;
use crate::error::{AuthenticationError, ConfigError};
use crate::provider::ProviderClient;
use crate::roles::{DefaultUserRoles, UserRoles};
use crate::session::Session;
use crate::validator::{TokenValidator, Validator, check_audience};

/// An authenticated bearer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerUser {
    identifier: Option<String>,
    roles: Vec<String>,
}

impl BearerUser {
    /// Create a user
    pub fn new(identifier: Option<String>, roles: Vec<String>) -> Self {
        Self { identifier, roles }
    }

    /// User identifier, empty for tokens without one (service accounts)
    pub fn user_identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or_default()
    }

    /// User identifier, if the token carried one
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Roles granted to the user
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

/// Strip an optional `Bearer ` prefix and surrounding whitespace
///
/// Anything that does not start with `Bearer` plus a whitespace character is
/// taken as the token itself.
pub fn extract_bearer_token(authorization: &str) -> String {
    let trimmed = authorization.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let token = trimmed
        .strip_prefix("Bearer")
        .and_then(|rest| {
            let mut chars = rest.chars();
            chars
                .next()
                .filter(char::is_ascii_whitespace)
                .map(|_| chars.as_str())
        })
        .unwrap_or(authorization);
    token.trim().to_string()
}

/// JSON body for a 401 response
pub fn unauthorized_response_body(error: &AuthenticationError) -> Value {
    json!({ "error": error.to_string() })
}

/// Complete 401 response for a failed authentication
pub fn unauthorized_response(error: &AuthenticationError) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(unauthorized_response_body(error).to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Upper bound on cached role sets
pub const ROLE_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct RoleCacheEntry {
    roles: Vec<String>,
    ttl: Duration,
}

/// Each role set lives as long as the session it was computed for
struct SessionExpiry;

impl Expiry<String, RoleCacheEntry> for SessionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &RoleCacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

fn role_cache() -> Cache<String, RoleCacheEntry> {
    Cache::builder()
        .max_capacity(ROLE_CACHE_CAPACITY)
        .expire_after(SessionExpiry)
        .build()
}

/// Authenticates requests carrying OpenID Connect bearer tokens
pub struct BearerAuthenticator {
    validator: Validator,
    required_audience: Option<String>,
    roles_from_scopes: bool,
    user_roles: Arc<dyn UserRoles>,
    role_cache: Cache<String, RoleCacheEntry>,
    attributes: AttributeProvider,
    identifier_claims: Vec<String>,
    app_secret: SecretString,
}

impl std::fmt::Debug for BearerAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthenticator")
            .field("validator", &self.validator)
            .field("required_audience", &self.required_audience)
            .field("roles_from_scopes", &self.roles_from_scopes)
            .field("user_roles", &self.user_roles)
            .field("cached_role_sets", &self.role_cache.entry_count())
            .field("attributes", &self.attributes)
            .field("identifier_claims", &self.identifier_claims)
            .finish_non_exhaustive()
    }
}

impl BearerAuthenticator {
    /// Create an authenticator from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate
    pub fn new(config: &OidcConfig, provider: Arc<ProviderClient>) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            validator: Validator::from_config(config, provider),
            required_audience: config.effective_audience().map(str::to_string),
            roles_from_scopes: config.set_roles_from_scopes,
            user_roles: Arc::new(DefaultUserRoles),
            role_cache: role_cache(),
            attributes: AttributeProvider::from_config(&config.attributes)?,
            identifier_claims: config.user_identifier_claims.clone(),
            app_secret: config.app_secret.clone(),
        })
    }

    /// Replace the scope to role mapping
    pub fn with_user_roles(mut self, user_roles: Arc<dyn UserRoles>) -> Self {
        self.user_roles = user_roles;
        self.role_cache.invalidate_all();
        self
    }

    /// The active validator
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Configured attribute rules
    pub fn attributes(&self) -> &AttributeProvider {
        &self.attributes
    }

    /// Fresh session for one request
    pub fn new_session(&self) -> Session {
        Session::with_settings(self.identifier_claims.clone(), self.app_secret.clone())
    }

    /// Whether this authenticator handles the request
    pub fn supports(&self, headers: &HeaderMap) -> bool {
        headers.contains_key(header::AUTHORIZATION)
    }

    /// Authenticate a request by its `Authorization` header
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::MissingToken`] if the header is absent or
    /// empty, otherwise whatever [`authenticate_token`](Self::authenticate_token)
    /// returns
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        session: &mut Session,
    ) -> Result<BearerUser, AuthenticationError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthenticationError::MissingToken)?;
        if value.is_empty() {
            return Err(AuthenticationError::MissingToken);
        }

        let authorization = value.to_str().map_err(|_| {
            info!("Authorization header is not valid ASCII");
            AuthenticationError::InvalidToken
        })?;

        let token = extract_bearer_token(authorization);
        self.authenticate_token(&token, session).await
    }

    /// Validate a raw token and populate the session
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::InvalidToken`] if validation fails and
    /// [`AuthenticationError::InvalidAudience`] if a required audience is
    /// configured and missing from the token
    pub async fn authenticate_token(
        &self,
        token: &str,
        session: &mut Session,
    ) -> Result<BearerUser, AuthenticationError> {
        let claims = self.validator.validate(token).await.map_err(|e| {
            info!(error = %e, remote = self.validator.is_remote(), "Invalid token");
            AuthenticationError::InvalidToken
        })?;

        if let Some(audience) = &self.required_audience {
            check_audience(&claims, audience).map_err(|e| {
                info!(error = %e, required_audience = %audience, "Invalid audience");
                AuthenticationError::InvalidAudience
            })?;
        }

        Ok(self.authenticate_validated(claims, session))
    }

    /// Populate the session from claims that were already validated
    pub fn authenticate_validated(&self, claims: ClaimSet, session: &mut Session) -> BearerUser {
        let scopes = extract_scopes(&claims);
        session.set_token(Some(claims));

        let identifier = session.user_identifier().ok().flatten();
        let roles = self.roles_for(session, identifier.as_deref(), &scopes);

        debug!(
            logging_id = %session.logging_id(),
            role_count = roles.len(),
            "Bearer authenticated"
        );
        BearerUser::new(identifier, roles)
    }

    fn roles_for(&self, session: &Session, identifier: Option<&str>, scopes: &[String]) -> Vec<String> {
        if !self.roles_from_scopes {
            return Vec::new();
        }

        let ttl = session.ttl().unwrap_or(-1);
        let Ok(ttl) = u64::try_from(ttl) else {
            return self.user_roles.roles(identifier, scopes);
        };
        if ttl == 0 {
            return self.user_roles.roles(identifier, scopes);
        }

        let key = json!([session.cache_key().unwrap_or_default(), identifier, scopes]).to_string();

        if let Some(entry) = self.role_cache.get(&key) {
            return entry.roles;
        }

        let roles = self.user_roles.roles(identifier, scopes);
        self.role_cache.insert(
            key,
            RoleCacheEntry {
                roles: roles.clone(),
                ttl: Duration::from_secs(ttl),
            },
        );
        roles
    }

    /// Number of live cached role sets
    ///
    /// Expired entries are evicted first.
    pub fn cached_role_sets(&self) -> u64 {
        self.role_cache.run_pending_tasks();
        self.role_cache.entry_count()
    }
}
