//! SQLite-based storage implementation

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    normalize_email, Address, AddressId, Identity, IdentityStore, OtpChallenge, StoreError,
    StoreResult, SubUser, SubUserId, UserId,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// How long a blocked connection waits before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based identity store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;

        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_sqlite_err)?;

        // Enable foreign keys so child rows follow their identity
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_err)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(map_sqlite_err)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite_err)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(map_sqlite_err)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Identity records
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                number TEXT,
                verified INTEGER NOT NULL DEFAULT 0,
                otp_code TEXT,
                otp_expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_identities_otp_expiry
                ON identities(otp_expires_at);

            -- Addresses (owned child records)
            CREATE TABLE IF NOT EXISTS addresses (
                id TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                house_number TEXT,
                street TEXT,
                city TEXT,
                state TEXT,
                postal_code TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_addresses_identity_id
                ON addresses(identity_id);

            -- Sub-users (owned child records)
            CREATE TABLE IF NOT EXISTS sub_users (
                id TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                number TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sub_users_identity_id
                ON sub_users(identity_id);
            "#,
        )
        .map_err(map_sqlite_err)?;

        Ok(())
    }

    fn fetch_identity(
        conn: &Connection,
        where_clause: &str,
        param: &str,
    ) -> StoreResult<Option<Identity>> {
        let sql = format!(
            "SELECT id, email, name, number, verified, otp_code, otp_expires_at, \
             created_at, updated_at FROM identities WHERE {where_clause}"
        );

        let raw = conn
            .query_row(&sql, params![param], |row| {
                Ok(RawIdentity {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    number: row.get(3)?,
                    verified: row.get(4)?,
                    otp_code: row.get(5)?,
                    otp_expires_at: row.get(6)?,
                    created_at: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            })
            .optional()
            .map_err(map_sqlite_err)?;

        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let mut identity = raw.into_identity()?;
        identity.addresses = load_addresses(conn, &identity.id)?;
        identity.sub_users = load_sub_users(conn, &identity.id)?;

        Ok(Some(identity))
    }
}

impl IdentityStore for SqliteStore {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let normalized = normalize_email(email);
        let conn = self.conn.lock().unwrap();
        Self::fetch_identity(&conn, "email = ?1", &normalized)
    }

    fn find_by_id(&self, id: &UserId) -> StoreResult<Option<Identity>> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_identity(&conn, "id = ?1", &id.to_string())
    }

    fn save(&self, mut identity: Identity) -> StoreResult<Identity> {
        let mut conn = self.conn.lock().unwrap();
        identity.updated_at = Utc::now();

        let tx = conn.transaction().map_err(map_sqlite_err)?;
        let id = identity.id.to_string();

        // Uniqueness is checked explicitly; the UNIQUE index is a backstop
        let taken: Option<String> = tx
            .query_row(
                "SELECT id FROM identities WHERE email = ?1 AND id <> ?2",
                params![identity.email, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_err)?;
        if taken.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        let (otp_code, otp_expires_at) = match &identity.otp {
            Some(challenge) => (
                Some(challenge.code.clone()),
                Some(challenge.expires_at.to_rfc3339()),
            ),
            None => (None, None),
        };

        tx.execute(
            "INSERT INTO identities (id, email, name, number, verified, otp_code, \
             otp_expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 email = excluded.email,
                 name = excluded.name,
                 number = excluded.number,
                 verified = excluded.verified,
                 otp_code = excluded.otp_code,
                 otp_expires_at = excluded.otp_expires_at,
                 updated_at = excluded.updated_at",
            params![
                id,
                identity.email,
                identity.name,
                identity.number,
                identity.verified as i32,
                otp_code,
                otp_expires_at,
                identity.created_at.to_rfc3339(),
                identity.updated_at.to_rfc3339(),
            ],
        )
        .map_err(map_sqlite_err)?;

        // Child rows are rewritten wholesale with the aggregate
        tx.execute("DELETE FROM addresses WHERE identity_id = ?1", params![id])
            .map_err(map_sqlite_err)?;
        for address in &identity.addresses {
            tx.execute(
                "INSERT INTO addresses (id, identity_id, house_number, street, city, state, postal_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    address.id.to_string(),
                    id,
                    address.house_number,
                    address.street,
                    address.city,
                    address.state,
                    address.postal_code,
                ],
            )
            .map_err(map_sqlite_err)?;
        }

        tx.execute("DELETE FROM sub_users WHERE identity_id = ?1", params![id])
            .map_err(map_sqlite_err)?;
        for sub_user in &identity.sub_users {
            tx.execute(
                "INSERT INTO sub_users (id, identity_id, name, email, number)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sub_user.id.to_string(),
                    id,
                    sub_user.name,
                    sub_user.email,
                    sub_user.number,
                ],
            )
            .map_err(map_sqlite_err)?;
        }

        tx.commit().map_err(map_sqlite_err)?;

        Ok(identity)
    }

    fn delete_by_id(&self, id: &UserId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();

        // ON DELETE CASCADE removes addresses and sub-users
        let rows_affected = conn
            .execute(
                "DELETE FROM identities WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(map_sqlite_err)?;

        Ok(rows_affected > 0)
    }

    fn purge_expired_otps(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(map_sqlite_err)?;
        let cutoff = now.to_rfc3339();

        let deleted = tx
            .execute(
                "DELETE FROM identities
                 WHERE verified = 0 AND otp_expires_at IS NOT NULL AND otp_expires_at <= ?1",
                params![cutoff],
            )
            .map_err(map_sqlite_err)?;

        let cleared = tx
            .execute(
                "UPDATE identities SET otp_code = NULL, otp_expires_at = NULL, updated_at = ?1
                 WHERE otp_expires_at IS NOT NULL AND otp_expires_at <= ?1",
                params![cutoff],
            )
            .map_err(map_sqlite_err)?;

        tx.commit().map_err(map_sqlite_err)?;

        Ok((deleted + cleared) as u64)
    }
}

struct RawIdentity {
    id: String,
    email: String,
    name: Option<String>,
    number: Option<String>,
    verified: i32,
    otp_code: Option<String>,
    otp_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawIdentity {
    fn into_identity(self) -> StoreResult<Identity> {
        let otp = match (self.otp_code, self.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(OtpChallenge {
                code,
                expires_at: parse_ts(&expires_at),
            }),
            _ => None,
        };

        Ok(Identity {
            id: UserId::parse(&self.id)
                .map_err(|e| StoreError::Backend(format!("invalid identity id: {e}")))?,
            email: self.email,
            name: self.name,
            number: self.number,
            verified: self.verified != 0,
            otp,
            addresses: Vec::new(),
            sub_users: Vec::new(),
            created_at: parse_ts(&self.created_at),
            updated_at: parse_ts(&self.updated_at),
        })
    }
}

fn load_addresses(conn: &Connection, identity_id: &UserId) -> StoreResult<Vec<Address>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, house_number, street, city, state, postal_code
             FROM addresses WHERE identity_id = ?1",
        )
        .map_err(map_sqlite_err)?;

    let rows = stmt
        .query_map(params![identity_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })
        .map_err(map_sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;

    rows.into_iter()
        .map(|(id, house_number, street, city, state, postal_code)| {
            Ok(Address {
                id: AddressId::parse(&id)
                    .map_err(|e| StoreError::Backend(format!("invalid address id: {e}")))?,
                house_number,
                street,
                city,
                state,
                postal_code,
            })
        })
        .collect()
}

fn load_sub_users(conn: &Connection, identity_id: &UserId) -> StoreResult<Vec<SubUser>> {
    let mut stmt = conn
        .prepare("SELECT id, name, email, number FROM sub_users WHERE identity_id = ?1")
        .map_err(map_sqlite_err)?;

    let rows = stmt
        .query_map(params![identity_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(map_sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;

    rows.into_iter()
        .map(|(id, name, email, number)| {
            Ok(SubUser {
                id: SubUserId::parse(&id)
                    .map_err(|e| StoreError::Backend(format!("invalid sub-user id: {e}")))?,
                name,
                email,
                number,
            })
        })
        .collect()
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn map_sqlite_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        if err.code == rusqlite::ErrorCode::DatabaseBusy
            || err.code == rusqlite::ErrorCode::DatabaseLocked
        {
            return StoreError::Timeout;
        }
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (store, dir) // Return dir to keep it alive
    }

    fn identity_with_otp(email: &str, code: &str, expires_at: DateTime<Utc>) -> Identity {
        let mut identity = Identity::new(email);
        identity.otp = Some(OtpChallenge {
            code: code.to_string(),
            expires_at,
        });
        identity
    }

    #[test]
    fn test_save_and_find_round_trip() {
        let (store, _dir) = create_test_store();

        let mut identity = Identity::new("Test@Example.COM");
        identity.name = Some("Test User".to_string());
        identity.number = Some("5551234".to_string());
        identity.addresses.push(Address {
            id: AddressId::new(),
            house_number: Some("12".to_string()),
            street: Some("Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: None,
            postal_code: Some("12345".to_string()),
        });
        identity.sub_users.push(SubUser {
            id: SubUserId::new(),
            name: "Kid".to_string(),
            email: "kid@example.com".to_string(),
            number: "5550000".to_string(),
        });

        let saved = store.save(identity).unwrap();

        let found = store.find_by_email("test@example.com").unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.email, "test@example.com");
        assert_eq!(found.name.as_deref(), Some("Test User"));
        assert_eq!(found.addresses.len(), 1);
        assert_eq!(found.addresses[0].street.as_deref(), Some("Main St"));
        assert_eq!(found.sub_users.len(), 1);
        assert_eq!(found.sub_users[0].email, "kid@example.com");

        let by_id = store.find_by_id(&saved.id).unwrap().unwrap();
        assert_eq!(by_id.email, found.email);
    }

    #[test]
    fn test_email_case_insensitive_lookup() {
        let (store, _dir) = create_test_store();

        store.save(Identity::new("Test@Example.COM")).unwrap();

        assert!(store.find_by_email("test@example.com").unwrap().is_some());
        assert!(store.find_by_email("TEST@EXAMPLE.COM").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _dir) = create_test_store();

        store.save(Identity::new("test@example.com")).unwrap();
        let result = store.save(Identity::new("test@example.com"));
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
    }

    #[test]
    fn test_resave_rewrites_children() {
        let (store, _dir) = create_test_store();

        let mut identity = Identity::new("test@example.com");
        identity.addresses.push(Address {
            id: AddressId::new(),
            house_number: None,
            street: Some("Old St".to_string()),
            city: None,
            state: None,
            postal_code: None,
        });
        let mut identity = store.save(identity).unwrap();

        identity.addresses.clear();
        identity.addresses.push(Address {
            id: AddressId::new(),
            house_number: None,
            street: Some("New St".to_string()),
            city: None,
            state: None,
            postal_code: None,
        });
        store.save(identity).unwrap();

        let found = store.find_by_email("test@example.com").unwrap().unwrap();
        assert_eq!(found.addresses.len(), 1);
        assert_eq!(found.addresses[0].street.as_deref(), Some("New St"));
    }

    #[test]
    fn test_otp_challenge_round_trip_preserves_leading_zeros() {
        let (store, _dir) = create_test_store();

        let expires_at = Utc::now() + Duration::minutes(5);
        store
            .save(identity_with_otp("test@example.com", "012345", expires_at))
            .unwrap();

        let found = store.find_by_email("test@example.com").unwrap().unwrap();
        let challenge = found.otp.unwrap();
        assert_eq!(challenge.code, "012345");
        assert!(!challenge.is_expired(Utc::now()));
    }

    #[test]
    fn test_delete_by_id_cascades() {
        let (store, _dir) = create_test_store();

        let mut identity = Identity::new("test@example.com");
        identity.sub_users.push(SubUser {
            id: SubUserId::new(),
            name: "Kid".to_string(),
            email: "kid@example.com".to_string(),
            number: "5550000".to_string(),
        });
        let saved = store.save(identity).unwrap();

        assert!(store.delete_by_id(&saved.id).unwrap());
        assert!(!store.delete_by_id(&saved.id).unwrap());
        assert!(store.find_by_email("test@example.com").unwrap().is_none());

        // Child rows went with the identity
        let conn = store.conn.lock().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sub_users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_purge_expired_otps() {
        let (store, _dir) = create_test_store();
        let now = Utc::now();

        store
            .save(identity_with_otp(
                "stale@example.com",
                "111111",
                now - Duration::minutes(1),
            ))
            .unwrap();
        let mut verified =
            identity_with_otp("verified@example.com", "222222", now - Duration::minutes(1));
        verified.verified = true;
        store.save(verified).unwrap();
        store
            .save(identity_with_otp(
                "fresh@example.com",
                "333333",
                now + Duration::minutes(5),
            ))
            .unwrap();

        let purged = store.purge_expired_otps(now).unwrap();
        assert_eq!(purged, 2);

        assert!(store.find_by_email("stale@example.com").unwrap().is_none());
        let kept = store.find_by_email("verified@example.com").unwrap().unwrap();
        assert!(kept.otp.is_none());
        let fresh = store.find_by_email("fresh@example.com").unwrap().unwrap();
        assert!(fresh.otp.is_some());
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path).unwrap();
            store.save(Identity::new("test@example.com")).unwrap();
        }

        let store = SqliteStore::open(path).unwrap();
        assert!(store.find_by_email("test@example.com").unwrap().is_some());
    }
}
