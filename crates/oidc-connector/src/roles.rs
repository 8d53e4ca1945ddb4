//! Role derivation from scopes

use std::fmt;

/// Prefix of roles derived by [`DefaultUserRoles`]
pub const SCOPE_ROLE_PREFIX: &str = "ROLE_SCOPE_";

/// Maps a user's scopes to host roles
///
/// Hosts with their own role model plug in an implementation here.
pub trait UserRoles: Send + Sync + fmt::Debug {
    /// Roles for `user_identifier` holding `scopes`
    fn roles(&self, user_identifier: Option<&str>, scopes: &[String]) -> Vec<String>;
}

/// `ROLE_SCOPE_` followed by the upper-cased scope, one role per scope
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUserRoles;

impl UserRoles for DefaultUserRoles {
    fn roles(&self, _user_identifier: Option<&str>, scopes: &[String]) -> Vec<String> {
        scopes
            .iter()
            .map(|scope| format!("{SCOPE_ROLE_PREFIX}{}", scope.to_uppercase()))
            .collect()
    }
}
