//! Role type definitions

use super::graph::GraphError;
use crate::scope::{is_prefix_scope, Template, PLACEHOLDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delegation rule: holding `assume:<role_id>` grants `scopes`
///
/// A `role_id` ending in `*` is parameterized. Its scopes may contain `<..>`,
/// replaced by whatever followed the fixed prefix in the activating scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Role identifier (e.g., "repo:github.com/org/*")
    pub role_id: String,

    /// Scope templates granted by the role
    pub scopes: Vec<String>,

    /// Free-form description, never used for resolution
    #[serde(default)]
    pub description: String,

    /// Lifecycle timestamps
    #[serde(default)]
    pub details: RoleDetails,
}

/// Role lifecycle timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetails {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Default for RoleDetails {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            last_modified: now,
        }
    }
}

impl Role {
    /// Create a new role
    pub fn new<I, S>(role_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role_id: role_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            description: String::new(),
            details: RoleDetails::default(),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the role id ends in `*`
    pub fn is_parameterized(&self) -> bool {
        is_prefix_scope(&self.role_id)
    }

    /// Fixed part of the role id
    pub fn prefix(&self) -> &str {
        self.role_id.strip_suffix('*').unwrap_or(&self.role_id)
    }

    /// Scopes pre-split at their placeholders
    pub fn templates(&self) -> Vec<Template> {
        self.scopes.iter().map(|s| Template::parse(s)).collect()
    }

    /// Validate the role definition
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidScopeSyntax`] if:
    /// - The role id is empty
    /// - A scope has an unbalanced `<..` or `..>` marker
    /// - A non-parameterized role uses `<..>`
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.role_id.is_empty() {
            return Err(self.syntax_error("", "role id cannot be empty"));
        }

        for scope in &self.scopes {
            Template::check_syntax(scope).map_err(|reason| self.syntax_error(scope, reason))?;

            if !self.is_parameterized() && scope.contains(PLACEHOLDER) {
                return Err(self.syntax_error(
                    scope,
                    "placeholder used in a role whose id does not end in '*'",
                ));
            }
        }

        Ok(())
    }

    fn syntax_error(&self, scope: &str, reason: &str) -> GraphError {
        GraphError::InvalidScopeSyntax {
            role_id: self.role_id.clone(),
            scope: scope.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Collapses duplicate role ids, keeping the last definition, sorted by id
pub(crate) fn dedup_roles(roles: &[Role]) -> Vec<&Role> {
    let mut latest: HashMap<&str, &Role> = HashMap::with_capacity(roles.len());
    for role in roles {
        latest.insert(role.role_id.as_str(), role);
    }

    let mut unique: Vec<&Role> = latest.into_values().collect();
    unique.sort_by(|a, b| a.role_id.cmp(&b.role_id));
    unique
}
