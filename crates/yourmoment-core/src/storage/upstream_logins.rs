//! CRUD operations for upstream platform credentials.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::error::StorageError;
use crate::vault::{self, VaultKey};

/// A stored upstream login, credentials decrypted on read.
#[derive(Debug, Clone)]
pub struct UpstreamLogin {
    /// Opaque identifier.
    pub id: Uuid,
    /// Owning user id.
    pub owner: Uuid,
    /// Display name shown in the UI/logs (never the raw username).
    pub display_name: String,
    /// Decrypted upstream username.
    pub username: String,
    /// Decrypted upstream password.
    pub password: String,
    /// Whether this login has platform-admin privileges upstream.
    pub is_admin: bool,
    /// Whether this login is eligible for the scheduler to use.
    pub is_active: bool,
    /// Last time a session was established for this login.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UpstreamLoginRow {
    id: String,
    owner: String,
    display_name: String,
    username_enc: String,
    password_enc: String,
    is_admin: bool,
    is_active: bool,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl UpstreamLoginRow {
    fn decrypt(self, key: &VaultKey) -> Result<UpstreamLogin, StorageError> {
        let username = vault::decrypt(&self.username_enc, key)
            .map_err(|e| StorageError::Query { source: sqlx::Error::Decode(Box::new(e)) })?;
        let password = vault::decrypt(&self.password_enc, key)
            .map_err(|e| StorageError::Query { source: sqlx::Error::Decode(Box::new(e)) })?;
        Ok(UpstreamLogin {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            owner: Uuid::parse_str(&self.owner).unwrap_or_default(),
            display_name: self.display_name,
            username,
            password,
            is_admin: self.is_admin,
            is_active: self.is_active,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        })
    }
}

/// Fields required to create a new upstream login.
pub struct NewUpstreamLogin {
    /// Owning user id.
    pub owner: Uuid,
    /// Display name.
    pub display_name: String,
    /// Plaintext upstream username (encrypted before storage).
    pub username_plaintext: String,
    /// Plaintext upstream password (encrypted before storage).
    pub password_plaintext: String,
    /// Whether this login has platform-admin privileges upstream.
    pub is_admin: bool,
}

/// Encrypt and insert a new upstream login.
pub async fn create(
    pool: &DbPool,
    new: NewUpstreamLogin,
    key: &VaultKey,
) -> Result<UpstreamLogin, StorageError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let username_enc = vault::encrypt(&new.username_plaintext, key)
        .map_err(|e| StorageError::Query { source: sqlx::Error::Encode(Box::new(e)) })?;
    let password_enc = vault::encrypt(&new.password_plaintext, key)
        .map_err(|e| StorageError::Query { source: sqlx::Error::Encode(Box::new(e)) })?;

    sqlx::query(
        "INSERT INTO upstream_logins \
         (id, owner, display_name, username_enc, password_enc, is_admin, is_active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(id.to_string())
    .bind(new.owner.to_string())
    .bind(&new.display_name)
    .bind(username_enc)
    .bind(password_enc)
    .bind(new.is_admin)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id, key).await
}

/// Fetch a login by id, decrypting its credentials.
pub async fn get(pool: &DbPool, id: Uuid, key: &VaultKey) -> Result<UpstreamLogin, StorageError> {
    let row: UpstreamLoginRow = sqlx::query_as("SELECT * FROM upstream_logins WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|source| StorageError::Query { source })?
        .ok_or(StorageError::NotFound {
            entity: "upstream_login",
            id,
        })?;

    row.decrypt(key)
}

/// List every active login owned by `owner`.
pub async fn list_active_for_owner(
    pool: &DbPool,
    owner: Uuid,
    key: &VaultKey,
) -> Result<Vec<UpstreamLogin>, StorageError> {
    let rows: Vec<UpstreamLoginRow> = sqlx::query_as(
        "SELECT * FROM upstream_logins WHERE owner = ? AND is_active = 1 ORDER BY created_at",
    )
    .bind(owner.to_string())
    .fetch_all(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    rows.into_iter().map(|r| r.decrypt(key)).collect()
}

/// Stamp `last_used_at` after a session has been (re-)established.
pub async fn mark_used(pool: &DbPool, id: Uuid) -> Result<(), StorageError> {
    sqlx::query("UPDATE upstream_logins SET last_used_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(|source| StorageError::Query { source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    fn test_key() -> VaultKey {
        VaultKey::from_bytes(vec![7u8; 32]).unwrap()
    }

    #[tokio::test]
    async fn create_and_decrypt_round_trip() {
        let pool = init_test_db().await.unwrap();
        let key = test_key();
        let owner = Uuid::new_v4();

        let login = create(
            &pool,
            NewUpstreamLogin {
                owner,
                display_name: "Bot account".to_string(),
                username_plaintext: "bot_user".to_string(),
                password_plaintext: "correct horse battery staple".to_string(),
                is_admin: false,
            },
            &key,
        )
        .await
        .unwrap();

        assert_eq!(login.username, "bot_user");
        assert_eq!(login.password, "correct horse battery staple");
        assert!(login.is_active);
    }

    #[tokio::test]
    async fn list_active_for_owner_filters_by_owner() {
        let pool = init_test_db().await.unwrap();
        let key = test_key();
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();

        create(
            &pool,
            NewUpstreamLogin {
                owner: owner_a,
                display_name: "A".to_string(),
                username_plaintext: "a".to_string(),
                password_plaintext: "pw".to_string(),
                is_admin: false,
            },
            &key,
        )
        .await
        .unwrap();
        create(
            &pool,
            NewUpstreamLogin {
                owner: owner_b,
                display_name: "B".to_string(),
                username_plaintext: "b".to_string(),
                password_plaintext: "pw".to_string(),
                is_admin: false,
            },
            &key,
        )
        .await
        .unwrap();

        let logins = list_active_for_owner(&pool, owner_a, &key).await.unwrap();
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].username, "a");
    }

    #[tokio::test]
    async fn mark_used_sets_timestamp() {
        let pool = init_test_db().await.unwrap();
        let key = test_key();
        let login = create(
            &pool,
            NewUpstreamLogin {
                owner: Uuid::new_v4(),
                display_name: "A".to_string(),
                username_plaintext: "a".to_string(),
                password_plaintext: "pw".to_string(),
                is_admin: false,
            },
            &key,
        )
        .await
        .unwrap();
        assert!(login.last_used_at.is_none());

        mark_used(&pool, login.id).await.unwrap();
        let refreshed = get(&pool, login.id, &key).await.unwrap();
        assert!(refreshed.last_used_at.is_some());
    }
}
