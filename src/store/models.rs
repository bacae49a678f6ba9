//! Data models for identity storage

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalize an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Unique identity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique address identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressId(Uuid);

impl AddressId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }
}

impl Default for AddressId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique sub-user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubUserId(Uuid);

impl SubUserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }
}

impl Default for SubUserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An issued one-time code awaiting verification.
///
/// Modeling the code and its expiry as one value keeps them present or
/// absent together. Not serializable; OTP state never crosses the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpChallenge {
    /// Stored as text so the submitted code must match exactly,
    /// leading zeros included
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A saved address owned by an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// A dependent contact record owned by an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubUser {
    pub id: SubUserId,
    pub name: String,
    pub email: String,
    pub number: String,
}

/// A user account record
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub number: Option<String>,
    pub verified: bool,
    pub otp: Option<OtpChallenge>,
    pub addresses: Vec<Address>,
    pub sub_users: Vec<SubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new unverified identity for an email address
    pub fn new(email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: normalize_email(email),
            name: None,
            number: None,
            verified: false,
            otp: None,
            addresses: Vec::new(),
            sub_users: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Full identity projection for CRUD responses. Carries everything the
/// client may see; OTP state stays out.
#[derive(Debug, Serialize)]
pub struct IdentityProfile {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub verified: bool,
    pub addresses: Vec<Address>,
    pub sub_users: Vec<SubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for IdentityProfile {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            number: identity.number,
            verified: identity.verified,
            addresses: identity.addresses,
            sub_users: identity.sub_users,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}
