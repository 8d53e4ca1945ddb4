//! Error types
//!
//! Each layer has its own error enum. Provider-side failures
//! ([`DiscoveryError`], [`ProviderError`]) are wrapped into
//! [`TokenValidationError`] at the validator boundary, and the entry point
//! collapses every validation failure into a generic [`AuthenticationError`]
//! so no server-side detail reaches the client.

use thiserror::Error;

/// Errors raised by the HTTP capability
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The request could not be sent or the response could not be read
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying error message
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// Response status code
        status: u16,
    },
}

/// Provider metadata or key retrieval failed
///
/// Network failures and malformed documents share this type; the message
/// carries the distinction for logs.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// Fetching the discovery document failed
    #[error("Config fetching failed: {0}")]
    Config(String),

    /// Fetching the key set failed
    #[error("Cert fetching failed: {0}")]
    Keys(String),

    /// Reading the provider time failed
    #[error("Provider time fetching failed: {0}")]
    Time(String),
}

/// Client-credentials or introspection call failed
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The discovery step before the call failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Remote validation client id or secret is not configured
    #[error("remote_validation_id/secret not set")]
    MissingCredentials,

    /// The provider does not advertise the required endpoint
    #[error("No {0} endpoint")]
    MissingEndpoint(&'static str),

    /// The HTTP call failed
    #[error("{operation} failed: {source}")]
    Http {
        /// Operation that was attempted
        operation: &'static str,
        /// Transport error
        #[source]
        source: HttpError,
    },

    /// The response body was not what the endpoint promised
    #[error("{operation}: invalid response: {reason}")]
    InvalidResponse {
        /// Operation that was attempted
        operation: &'static str,
        /// Parse failure
        reason: String,
    },
}

/// A token was rejected
#[derive(Debug, Clone, Error)]
pub enum TokenValidationError {
    /// Provider metadata or keys were unavailable
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Introspection could not be performed
    #[error("Introspection failed: {0}")]
    Introspection(#[from] ProviderError),

    /// Token could not be parsed or its signature did not verify
    #[error("Unable to verify the token: {0}")]
    Verification(String),

    /// A claim check failed after signature verification
    #[error("Token validation failed: {0}")]
    Claims(String),

    /// Introspection reported the token as inactive
    #[error("The token does not exist or is not valid anymore")]
    Inactive,

    /// The token was not issued for the required audience
    #[error("Bad audience")]
    BadAudience,
}

/// Configuration rejected at load time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required value is missing
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    /// A value is syntactically invalid
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// An attribute rule configures both scopes and a claim
    #[error("attribute '{0}' must not configure both 'scopes' and 'claim'")]
    AmbiguousAttribute(String),

    /// An attribute rule configures neither scopes nor a claim
    #[error("attribute '{0}' must configure either 'scopes' or 'claim'")]
    EmptyAttribute(String),

    /// Two attribute rules share a name
    #[error("attribute '{0}' is configured more than once")]
    DuplicateAttribute(String),
}

/// Session derivation queried before a token was set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No token has been set on the session
    #[error("JWT not set")]
    NoToken,
}

/// What the entry point reports to the host
///
/// The messages are safe to send to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// No `Authorization` header, or an empty one
    #[error("Token is not present in the request headers")]
    MissingToken,

    /// The token failed validation
    #[error("Invalid token")]
    InvalidToken,

    /// The token is valid but not for this audience
    #[error("Invalid token audience")]
    InvalidAudience,
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for token validation
pub type ValidationResult<T> = Result<T, TokenValidationError>;
