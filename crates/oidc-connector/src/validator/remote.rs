//! Remote token validation through RFC 7662 introspection
//!
//! Every request costs a round trip to the provider, but revoked tokens are
//! rejected immediately.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::TokenValidator;
use crate::claims::ClaimSet;
use crate::error::{TokenValidationError, ValidationResult};
use crate::provider::ProviderClient;

/// Validates tokens by asking the provider
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    provider: Arc<ProviderClient>,
}

impl RemoteValidator {
    /// Create a validator
    pub fn new(provider: Arc<ProviderClient>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenValidator for RemoteValidator {
    async fn validate(&self, token: &str) -> ValidationResult<ClaimSet> {
        let claims = self.provider.introspect(token).await?;

        if claims.get("active") != Some(&Value::Bool(true)) {
            debug!(active = ?claims.get("active"), "Introspection reported inactive token");
            return Err(TokenValidationError::Inactive);
        }

        Ok(claims)
    }
}
