//! Authorization attributes derived from scopes and claims
//!
//! Each configured attribute is either
//!
//! - a scope rule: `true` when the user holds any of the listed scopes
//! - a claim rule: the raw value of one claim, or `null`

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::AttributeConfig;
use crate::error::ConfigError;
use crate::session::Session;

/// How one attribute is computed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRule {
    /// Granted if any of these scopes is present
    Scopes(Vec<String>),
    /// Value of this claim
    Claim(String),
}

impl TryFrom<&AttributeConfig> for AttributeRule {
    type Error = ConfigError;

    fn try_from(config: &AttributeConfig) -> Result<Self, Self::Error> {
        match (&config.scopes, &config.claim) {
            (Some(scopes), None) => Ok(Self::Scopes(scopes.clone())),
            (None, Some(claim)) => Ok(Self::Claim(claim.clone())),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousAttribute(config.name.clone())),
            (None, None) => Err(ConfigError::EmptyAttribute(config.name.clone())),
        }
    }
}

/// Evaluates configured attributes against a session
#[derive(Debug, Clone, Default)]
pub struct AttributeProvider {
    rules: Vec<(String, AttributeRule)>,
}

impl AttributeProvider {
    /// Build the rule table, keeping configuration order
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a rule sets both or neither of scopes and
    /// claim, or a name appears twice
    pub fn from_config(attributes: &[AttributeConfig]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(attributes.len());

        for attribute in attributes {
            let rule = AttributeRule::try_from(attribute)?;
            if !seen.insert(attribute.name.as_str()) {
                return Err(ConfigError::DuplicateAttribute(attribute.name.clone()));
            }
            rules.push((attribute.name.clone(), rule));
        }

        Ok(Self { rules })
    }

    /// Attribute names in configuration order
    pub fn available_attributes(&self) -> Vec<&str> {
        self.rules.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether `name` is configured
    pub fn has_attribute(&self, name: &str) -> bool {
        self.rule(name).is_some()
    }

    /// Rule for `name`
    pub fn rule(&self, name: &str) -> Option<&AttributeRule> {
        self.rules
            .iter()
            .find(|(rule_name, _)| rule_name == name)
            .map(|(_, rule)| rule)
    }

    // Scopes only count for the user the session belongs to
    fn session_scopes(session: &Session, user_identifier: Option<&str>) -> Vec<String> {
        match session.user_identifier() {
            Ok(identifier) if identifier.as_deref() == user_identifier => {
                session.scopes().unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    fn evaluate(rule: &AttributeRule, session: &Session, scopes: &[String]) -> Value {
        match rule {
            AttributeRule::Scopes(wanted) => {
                Value::Bool(wanted.iter().any(|scope| scopes.contains(scope)))
            }
            AttributeRule::Claim(claim) => session
                .token()
                .and_then(|claims| claims.get(claim))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    /// Value of attribute `name` for `user_identifier`
    ///
    /// Unknown names yield `null`.
    pub fn attribute(&self, session: &Session, user_identifier: Option<&str>, name: &str) -> Value {
        let Some(rule) = self.rule(name) else {
            return Value::Null;
        };
        let scopes = Self::session_scopes(session, user_identifier);
        Self::evaluate(rule, session, &scopes)
    }

    /// Every configured attribute for `user_identifier`
    pub fn user_attributes(&self, session: &Session, user_identifier: Option<&str>) -> Map<String, Value> {
        let scopes = Self::session_scopes(session, user_identifier);
        self.rules
            .iter()
            .map(|(name, rule)| (name.clone(), Self::evaluate(rule, session, &scopes)))
            .collect()
    }
}
