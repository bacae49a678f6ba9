//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{normalize_email, Identity, IdentityStore, StoreError, StoreResult, UserId};

/// In-memory identity store
pub struct InMemoryStore {
    identities: RwLock<HashMap<UserId, Identity>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
        }
    }

    /// Overwrite the OTP expiry for an email (for testing purposes)
    pub fn set_otp_expiry(
        &self,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let normalized = normalize_email(email);
        let mut identities = self.identities.write().unwrap();
        let identity = identities
            .values_mut()
            .find(|i| i.email == normalized)
            .ok_or_else(|| StoreError::Backend(format!("no identity for {normalized}")))?;
        match identity.otp.as_mut() {
            Some(challenge) => {
                challenge.expires_at = expires_at;
                Ok(())
            }
            None => Err(StoreError::Backend("no pending challenge".to_string())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for InMemoryStore {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let normalized = normalize_email(email);
        let identities = self.identities.read().unwrap();
        Ok(identities.values().find(|i| i.email == normalized).cloned())
    }

    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<Identity>> {
        Ok(self.identities.read().unwrap().get(id).cloned())
    }

    fn save(&self, mut identity: Identity) -> StoreResult<Identity> {
        let mut identities = self.identities.write().unwrap();
        let taken = identities
            .values()
            .any(|existing| existing.id != identity.id && existing.email == identity.email);
        if taken {
            return Err(StoreError::DuplicateEmail);
        }
        identity.updated_at = Utc::now();
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    fn delete_by_id(&self, id: &UserId) -> StoreResult<bool> {
        Ok(self.identities.write().unwrap().remove(id).is_some())
    }

    fn purge_expired_otps(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut identities = self.identities.write().unwrap();

        let before = identities.len();
        identities.retain(|_, identity| {
            identity.verified || !identity.otp.as_ref().is_some_and(|c| c.is_expired(now))
        });
        let mut purged = (before - identities.len()) as u64;

        for identity in identities.values_mut() {
            if identity.otp.as_ref().is_some_and(|c| c.is_expired(now)) {
                identity.otp = None;
                identity.updated_at = now;
                purged += 1;
            }
        }

        Ok(purged)
    }
}
