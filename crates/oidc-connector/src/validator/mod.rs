//! # Token Validators
//!
//! Two interchangeable strategies produce the same normalized [`ClaimSet`]:
//!
//! - [`LocalValidator`] verifies the signature with the provider's JWKS and
//!   checks `iat`/`nbf`/`exp`/`iss` with a configurable leeway
//! - [`RemoteValidator`] asks the provider's introspection endpoint
//!
//! Audience is checked separately with [`check_audience`].

mod audience;
mod local;
mod remote;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use audience::check_audience;
pub use local::{
    FORBIDDEN_ALGORITHMS, LocalValidator, SUPPORTED_ALGORITHMS, SigningAlgorithm,
    accepted_algorithms, check_claims, normalize_claims, verify_signature,
};
pub use remote::RemoteValidator;

use crate::claims::ClaimSet;
use crate::config::OidcConfig;
use crate::error::ValidationResult;
use crate::provider::ProviderClient;

/// Turns a raw bearer token into a validated claim set
///
/// A rejected token is an `Err`, never a panic.
#[async_trait]
pub trait TokenValidator: Send + Sync + fmt::Debug {
    /// Validate `token` and return its claims
    async fn validate(&self, token: &str) -> ValidationResult<ClaimSet>;
}

/// The configured validation strategy
#[derive(Debug, Clone)]
pub enum Validator {
    /// Signature verification with the provider's keys
    Local(LocalValidator),
    /// Provider introspection
    Remote(RemoteValidator),
}

impl Validator {
    /// Pick the strategy from configuration
    pub fn from_config(config: &OidcConfig, provider: Arc<ProviderClient>) -> Self {
        if config.remote_validation {
            Self::Remote(RemoteValidator::new(provider))
        } else {
            Self::Local(LocalValidator::new(provider, config.local_validation_leeway))
        }
    }

    /// Whether this is the introspection strategy
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[async_trait]
impl TokenValidator for Validator {
    async fn validate(&self, token: &str) -> ValidationResult<ClaimSet> {
        match self {
            Self::Local(validator) => validator.validate(token).await,
            Self::Remote(validator) => validator.validate(token).await,
        }
    }
}
