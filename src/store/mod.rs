//! Storage abstractions for identities

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced by identity storage, distinguishable from domain
/// failures at the operation boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("store operation timed out")]
    Timeout,

    #[error("store failure: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for identity storage
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by email (case-insensitive)
    fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    /// Look up an identity by id
    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<Identity>>;

    /// Insert or update an identity, enforcing email uniqueness across
    /// identities. Returns the stored record with its update timestamp
    /// refreshed.
    fn save(&self, identity: Identity) -> StoreResult<Identity>;

    /// Delete an identity and its owned records. Returns false when no
    /// such identity exists.
    fn delete_by_id(&self, id: &UserId) -> StoreResult<bool>;

    /// Clear expired OTP state: unverified identities whose challenge
    /// lapsed are abandoned registrations and are removed outright;
    /// verified identities keep the record and lose the challenge.
    /// Returns the number of identities touched.
    fn purge_expired_otps(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
