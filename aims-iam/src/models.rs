//! AIMS entities as returned by the API
//!
//! Every record keeps fields it does not know about in `extra`, so a decoded
//! value serializes back to the JSON the server sent. The one exception is an
//! explicit `null` on a known optional field: it decodes as absent and is
//! omitted on the way back out.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Permission string to effect string (e.g. `"*:own:*:*" => "allowed"`)
pub type Permissions = BTreeMap<String, String>;

/// When and by whom a record was created or modified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeStamp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChangeStamp {
    pub fn at_datetime(&self) -> Option<DateTime<Utc>> {
        self.at.and_then(|at| Utc.timestamp_opt(at, 0).single())
    }
}

/// An AIMS account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ChangeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ChangeStamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reference to the same person's user record in another location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedUser {
    pub location: String,
    pub user_id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login credential embedded in a user when `include_user_credential` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time_password: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ChangeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ChangeStamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An AIMS user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_users: Option<Vec<LinkedUser>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_credential: Option<UserCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ChangeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ChangeStamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An AIMS role.
///
/// Global roles are shared by every account; their `account_id` is not the
/// caller's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub permissions: Permissions,
    /// Pre-permission-string grants, kept as the server sends them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_permissions: Option<Vec<Value>>,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ChangeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ChangeStamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Role {
    pub fn is_global(&self) -> bool {
        self.global.unwrap_or(false)
    }

    /// Effect granted to `permission`, if the role lists it
    pub fn effect(&self, permission: &str) -> Option<&str> {
        self.permissions.get(permission).map(String::as_str)
    }
}

/// A programmatic credential issued to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKey {
    pub access_key_id: String,
    pub user_id: String,
    pub account_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ChangeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ChangeStamp>,
    /// Only present in the response to key creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a successful login
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiration: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Authentication {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expiration
            .and_then(|at| Utc.timestamp_opt(at, 0).single())
    }

    /// A token without an expiration is never reported as expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires| expires <= now)
    }
}

/// Identity and roles resolved from a bearer token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenInfo {
    pub fn authentication(&self) -> Authentication {
        Authentication {
            user: self.user.clone(),
            account: self.account.clone(),
            token: self.token.clone(),
            token_expiration: self.token_expiration,
            extra: Map::new(),
        }
    }
}

/// Flags accepted by the user read endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_role_ids: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_user_credential: Option<bool>,
}

impl UserQuery {
    pub fn include_role_ids(mut self, include: bool) -> Self {
        self.include_role_ids = Some(include);
        self
    }

    pub fn include_user_credential(mut self, include: bool) -> Self {
        self.include_user_credential = Some(include);
        self
    }
}

// === List envelopes ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountList {
    pub accounts: Vec<Account>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountIdList {
    pub account_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleList {
    pub roles: Vec<Role>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyList {
    pub access_keys: Vec<AccessKey>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
