//! # OIDC Connector - Bearer Token Validation for OpenID Connect Providers
//!
//! Authenticates bearer tokens issued by an OpenID Connect provider such as
//! Keycloak and derives authorization data (roles and attributes) from the
//! token's scopes and claims. A host request pipeline calls the
//! [`BearerAuthenticator`] once per request and keeps the resulting
//! [`Session`] for the lifetime of that request.
//!
//! ## Key Features
//!
//! - **Discovery** - Provider metadata memoized per client, JWKS behind a TTL cache
//! - **Local Validation** - JWS signature check against the provider's keys with
//!   `iat`/`nbf`/`exp`/`iss` checks and configurable leeway
//! - **Remote Validation** - RFC 7662 token introspection
//! - **Audience Policy** - Optional required audience
//! - **Identity** - Stable user identifier, scopes, privacy-preserving logging ids
//! - **Authorization Data** - Roles from scopes, configurable attributes
//!
//! ## Architecture
//!
//! - [`http`](crate::http) - Injectable HTTP capability and response cache
//! - [`provider`] - Discovery, JWKS, provider time, introspection, client credentials
//! - [`claims`] - Claim sets and scope extraction
//! - [`validator`] - Local and remote validators, audience check
//! - [`session`] - Request-scoped session and derived identity values
//! - [`attributes`] - Scope and claim based attributes
//! - [`roles`] - Scope to role mapping
//! - [`authenticator`] - Per-request entry point
//! - [`config`] - Configuration types
//! - [`error`] - Error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oidc_connector::{BearerAuthenticator, OidcConfig, ProviderClient};
//!
//! # async fn example(headers: http::HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OidcConfig::new("https://sso.example.com/realms/acme")
//!     .with_required_audience("orders-api")
//!     .with_roles_from_scopes(true);
//!
//! let provider = Arc::new(ProviderClient::new(&config)?);
//! let authenticator = BearerAuthenticator::new(&config, provider)?;
//!
//! let mut session = authenticator.new_session();
//! let user = authenticator.authenticate(&headers, &mut session).await?;
//!
//! println!("{} ({})", user.user_identifier(), session.logging_id());
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod roles;
pub mod session;
pub mod validator;

#[doc(inline)]
pub use crate::attributes::{AttributeProvider, AttributeRule};
#[doc(inline)]
pub use crate::authenticator::{BearerAuthenticator, BearerUser};
#[doc(inline)]
pub use crate::claims::ClaimSet;
#[doc(inline)]
pub use crate::config::{AttributeConfig, OidcConfig};
#[doc(inline)]
pub use crate::error::{
    AuthenticationError, ConfigError, DiscoveryError, HttpError, ProviderError, SessionError,
    TokenValidationError,
};
#[doc(inline)]
pub use crate::http::{CachingHttpClient, HttpClient, ReqwestHttpClient, ResponseCache};
#[doc(inline)]
pub use crate::provider::{ProviderClient, ProviderMetadata};
#[doc(inline)]
pub use crate::roles::{DefaultUserRoles, UserRoles};
#[doc(inline)]
pub use crate::session::Session;
#[doc(inline)]
pub use crate::validator::{LocalValidator, RemoteValidator, TokenValidator, Validator};
