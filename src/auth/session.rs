use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::accounts::Identity;
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Create a new session holding a snapshot of `identity`. Returns the session token.
pub fn create_session(
    pool: &DbPool,
    identity: &Identity,
    hours: u64,
) -> Result<String, RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let identity_json = serde_json::to_string(identity)?;

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, identity_json, expires_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
        params![id, identity.id, token, identity_json, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve a live session token to the identity stored with it.
pub fn load_session(pool: &DbPool, token: &str) -> Result<Option<Identity>, RepositoryError> {
    let conn = pool.get()?;

    let json: Option<String> = conn
        .query_row(
            "SELECT identity_json FROM sessions
             WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Rewrite the identity snapshot in every session of that user.
pub fn refresh_identity(pool: &DbPool, identity: &Identity) -> Result<usize, RepositoryError> {
    let conn = pool.get()?;
    let identity_json = serde_json::to_string(identity)?;

    let rows = conn.execute(
        "UPDATE sessions SET identity_json = ?1 WHERE user_id = ?2",
        params![identity_json, identity.id],
    )?;
    Ok(rows)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Remove sessions past their expiry. Returns how many were dropped.
pub fn purge_expired(pool: &DbPool) -> Result<usize, RepositoryError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(rows)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{
        AccountRepository, AvatarChange, Email, ProfileUpdate, SqliteAccountRepository,
    };
    use crate::db;
    use chrono::Utc;

    fn test_pool() -> (DbPool, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (pool, tmp)
    }

    async fn registered(pool: &DbPool) -> Identity {
        let identity = Identity::register(
            Email::parse("user@example.com").unwrap(),
            "John Doe",
            Utc::now(),
        )
        .unwrap();
        SqliteAccountRepository::new(pool.clone())
            .create(&identity, "hash")
            .await
            .unwrap();
        identity
    }

    fn session_count(pool: &DbPool) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn session_round_trips_identity() {
        let (pool, _tmp) = test_pool();
        let identity = registered(&pool).await;

        let token = create_session(&pool, &identity, 1).unwrap();
        assert_eq!(load_session(&pool, &token).unwrap(), Some(identity));
    }

    #[tokio::test]
    async fn unknown_token_loads_nothing() {
        let (pool, _tmp) = test_pool();
        assert_eq!(load_session(&pool, "nope").unwrap(), None);
    }

    #[tokio::test]
    async fn expired_session_is_ignored_and_purged() {
        let (pool, _tmp) = test_pool();
        let identity = registered(&pool).await;
        let token = create_session(&pool, &identity, 0).unwrap();

        assert_eq!(load_session(&pool, &token).unwrap(), None);
        assert_eq!(purge_expired(&pool).unwrap(), 1);
        assert_eq!(session_count(&pool), 0);
    }

    #[tokio::test]
    async fn refresh_rewrites_every_session_of_user() {
        let (pool, _tmp) = test_pool();
        let identity = registered(&pool).await;
        let phone = create_session(&pool, &identity, 1).unwrap();
        let laptop = create_session(&pool, &identity, 1).unwrap();

        let renamed = identity
            .apply_profile(ProfileUpdate {
                name: Some("Jane Doe".into()),
                email: None,
                avatar: AvatarChange::Keep,
            })
            .unwrap();
        assert_eq!(refresh_identity(&pool, &renamed).unwrap(), 2);

        for token in [phone, laptop] {
            let loaded = load_session(&pool, &token).unwrap().unwrap();
            assert_eq!(loaded.name, "Jane Doe");
        }
    }

    #[tokio::test]
    async fn delete_session_logs_out_only_that_token() {
        let (pool, _tmp) = test_pool();
        let identity = registered(&pool).await;
        let a = create_session(&pool, &identity, 1).unwrap();
        let b = create_session(&pool, &identity, 1).unwrap();

        delete_session(&pool, &a).unwrap();
        assert!(load_session(&pool, &a).unwrap().is_none());
        assert!(load_session(&pool, &b).unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_sessions() {
        let (pool, _tmp) = test_pool();
        let identity = registered(&pool).await;
        create_session(&pool, &identity, 1).unwrap();
        create_session(&pool, &identity, 1).unwrap();

        SqliteAccountRepository::new(pool.clone())
            .delete(&identity.id)
            .await
            .unwrap();
        assert_eq!(session_count(&pool), 0);
    }
}
