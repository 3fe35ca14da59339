//! Records loaded from the authoritative store on a cache miss.
//!
//! All records are immutable once loaded. A reload replaces the cached
//! collection wholesale rather than patching individual entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a sending service.
pub type ServiceId = Uuid;

/// An API key belonging to a service.
///
/// The secret itself never passes through this layer; `secret_ref` names where
/// the signing secret lives so the authentication middleware can fetch it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Key identifier
    pub id: Uuid,
    /// Reference to the signing secret
    pub secret_ref: String,
    /// When the key was revoked, if it has been
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Creates a key with no expiry.
    pub fn new(id: Uuid, secret_ref: impl Into<String>) -> Self {
        Self {
            id,
            secret_ref: secret_ref.into(),
            expiry_date: None,
        }
    }

    /// Returns the same key revoked at `expiry`.
    pub fn expiring_at(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    /// Returns true if the key can still authenticate at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date {
            None => true,
            Some(expiry) => expiry > now,
        }
    }

    /// Returns true if the key can still authenticate right now.
    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now())
    }
}

/// One permission granted to a service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionRecord {
    /// Permission name, e.g. `"sms"`
    pub name: String,
}

impl PermissionRecord {
    /// Permission to send email.
    pub const EMAIL: &'static str = "email";
    /// Permission to send text messages.
    pub const SMS: &'static str = "sms";
    /// Permission to send letters.
    pub const LETTER: &'static str = "letter";
    /// Permission to send text messages abroad.
    pub const INTERNATIONAL_SMS: &'static str = "international_sms";
    /// Permission to receive text messages.
    pub const INBOUND_SMS: &'static str = "inbound_sms";
    /// Permission to attach uploaded documents.
    pub const UPLOAD_DOCUMENT: &'static str = "upload_document";

    /// Creates a permission record.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns true if this record grants `name`.
    pub fn grants(&self, name: &str) -> bool {
        self.name == name
    }
}

impl fmt::Display for PermissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for PermissionRecord {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Everything the authentication path needs about one service.
///
/// Fetched in a single round trip so that a cold request populates all
/// three concern caches at once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// Current API keys, live and revoked
    pub api_keys: Vec<ApiKeyRecord>,
    /// Granted permissions
    pub permissions: Vec<PermissionRecord>,
    /// Whether the service may send
    pub active: bool,
}

impl ServiceSnapshot {
    /// Returns the keys that are live at `now`.
    pub fn live_keys_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ApiKeyRecord> {
        self.api_keys.iter().filter(move |k| k.is_live_at(now))
    }

    /// Returns true if any permission grants `name`.
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.grants(name))
    }
}
