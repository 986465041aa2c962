// Account persistence - every users-table side effect goes through here
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::accounts::domain::{Email, Identity, Role};
use crate::db::{from_db_time, is_unique_violation, to_db_time, RepositoryError};
use crate::state::DbPool;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account. Fails with `Conflict` when the email is taken.
    async fn create(&self, identity: &Identity, password_hash: &str) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Identity>, RepositoryError>;

    /// Look up an account together with its password hash
    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(Identity, String)>, RepositoryError>;

    async fn password_hash(&self, id: &str) -> Result<Option<String>, RepositoryError>;

    /// Persist name and avatar. Email and role are never rewritten.
    async fn update_profile(&self, identity: &Identity) -> Result<bool, RepositoryError>;

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, RepositoryError>;

    /// Remove the account and, through the foreign key, its sessions.
    /// Reports and comments it authored stay untouched.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;
}

pub struct SqliteAccountRepository {
    pool: DbPool,
}

impl SqliteAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const IDENTITY_COLUMNS: &str = "id, name, email, role, avatar, created_at";

fn identity_from_row(row: &Row<'_>) -> Result<Identity, RepositoryError> {
    let role: String = row.get(3)?;
    let email: String = row.get(2)?;
    let created_at: String = row.get(5)?;
    Ok(Identity {
        id: row.get(0)?,
        name: row.get(1)?,
        email: Email::parse(&email)
            .map_err(|_| RepositoryError::Corrupt(format!("bad email {:?}", email)))?,
        role: Role::parse(&role)
            .ok_or_else(|| RepositoryError::Corrupt(format!("bad role {:?}", role)))?,
        avatar: row.get(4)?,
        created_at: from_db_time(&created_at)?,
    })
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, identity: &Identity, password_hash: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        let result = conn.execute(
            "INSERT INTO users (id, email, name, role, avatar, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                identity.id,
                identity.email.as_str(),
                identity.name,
                identity.role.as_str(),
                identity.avatar,
                password_hash,
                to_db_time(&identity.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                identity.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Identity>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            IDENTITY_COLUMNS
        ))?;
        let mut rows = stmt.query(params![id])?;
        let identity = match rows.next()? {
            Some(row) => Some(identity_from_row(row)?),
            None => None,
        };
        Ok(identity)
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(Identity, String)>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, password_hash FROM users WHERE email = ?1",
            IDENTITY_COLUMNS
        ))?;
        let mut rows = stmt.query(params![email.as_str()])?;
        let found = match rows.next()? {
            Some(row) => {
                let identity = identity_from_row(row)?;
                let hash: String = row.get(6)?;
                Some((identity, hash))
            }
            None => None,
        };
        Ok(found)
    }

    async fn password_hash(&self, id: &str) -> Result<Option<String>, RepositoryError> {
        let conn = self.pool.get()?;
        let hash = conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    async fn update_profile(&self, identity: &Identity) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET name = ?1, avatar = ?2 WHERE id = ?3",
            params![identity.name, identity.avatar, identity.id],
        )?;
        Ok(rows > 0)
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(rows > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynAccountRepository = Arc<dyn AccountRepository>;
