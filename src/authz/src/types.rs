//! Client and snapshot types

use crate::roles::{Role, RoleDetails};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope prefix every client implicitly holds, followed by its client id
pub const CLIENT_ROLE_PREFIX: &str = "assume:client-id:";

/// Unique client identifier
pub type ClientId = String;

/// Credential record as read from client storage
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Client identifier (e.g., "root", "project/ci")
    pub client_id: ClientId,

    #[serde(default)]
    pub description: String,

    /// Secret; only ever compared by the caller, never part of a snapshot
    #[serde(default, skip_serializing)]
    pub access_token: String,

    /// Expiry timestamp
    pub expires: DateTime<Utc>,

    /// Scopes granted directly, in addition to `assume:client-id:<clientId>`
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub details: ClientDetails,
}

/// Client lifecycle timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Only refreshed when it falls behind by more than the configured delay
    pub last_date_used: DateTime<Utc>,
    /// Last time the access token was reset
    pub last_rotated: DateTime<Utc>,
}

impl Default for ClientDetails {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            last_modified: now,
            last_date_used: now,
            last_rotated: now,
        }
    }
}

impl Client {
    /// Create a new client
    pub fn new(
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            description: String::new(),
            access_token: access_token.into(),
            expires,
            scopes: Vec::new(),
            disabled: false,
            details: ClientDetails::default(),
        }
    }

    /// Grant scopes directly to the client
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the last-used timestamp
    pub fn with_last_date_used(mut self, at: DateTime<Utc>) -> Self {
        self.details.last_date_used = at;
        self
    }

    /// Whether the client has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// Scopes the client's expansion starts from
    pub fn activation_scopes(&self) -> Vec<String> {
        let mut scopes = self.scopes.clone();
        scopes.push(format!("{}{}", CLIENT_ROLE_PREFIX, self.client_id));
        scopes
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("description", &self.description)
            .field("access_token", &"<redacted>")
            .field("expires", &self.expires)
            .field("scopes", &self.scopes)
            .field("disabled", &self.disabled)
            .field("details", &self.details)
            .finish()
    }
}

/// A client as served to callers, with its expanded scopes
///
/// Expired clients are returned as-is; rejecting them is the caller's call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub client_id: ClientId,
    pub description: String,
    pub expires: DateTime<Utc>,
    pub disabled: bool,
    pub scopes: Vec<String>,
    pub expanded_scopes: Vec<String>,
    #[serde(flatten)]
    pub details: ClientDetails,
}

impl ClientSnapshot {
    /// Combine a client record with its expansion
    pub fn new(client: &Client, expanded_scopes: Vec<String>) -> Self {
        Self {
            client_id: client.client_id.clone(),
            description: client.description.clone(),
            expires: client.expires,
            disabled: client.disabled,
            scopes: client.scopes.clone(),
            expanded_scopes,
            details: client.details.clone(),
        }
    }

    /// Whether the client has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// A role as served to callers, with its expanded scopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSnapshot {
    pub role_id: String,
    pub description: String,
    pub scopes: Vec<String>,
    pub expanded_scopes: Vec<String>,
    #[serde(flatten)]
    pub details: RoleDetails,
}

impl RoleSnapshot {
    /// Combine a role with its expansion
    pub fn new(role: &Role, expanded_scopes: Vec<String>) -> Self {
        Self {
            role_id: role.role_id.clone(),
            description: role.description.clone(),
            scopes: role.scopes.clone(),
            expanded_scopes,
            details: role.details.clone(),
        }
    }
}
