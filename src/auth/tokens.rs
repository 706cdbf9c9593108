use rusqlite::{params, OptionalExtension};

use crate::api::models::CredentialPair;
use crate::error::ClientResult;
use crate::state::DbPool;

pub const ACCESS_TOKEN_KEY: &str = "access";
pub const REFRESH_TOKEN_KEY: &str = "refresh";

/// Durable home of the credential pair, scoped to one API origin.
///
/// Anything may read it. Only the login, refresh and logout flows in
/// [`crate::auth::session`] write to it.
#[derive(Clone)]
pub struct TokenHolder {
    db: DbPool,
    origin: String,
}

impl TokenHolder {
    pub fn new(db: DbPool, origin: impl Into<String>) -> Self {
        Self {
            db,
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Store both tokens, replacing any previous pair. No shape validation.
    pub fn set(&self, access_token: &str, refresh_token: &str) -> ClientResult<()> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;
        for (key, value) in [
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token),
        ] {
            tx.execute(
                "INSERT INTO local_storage (origin, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(origin, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = datetime('now')",
                params![self.origin, key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// The stored pair, or `None` if never set or cleared.
    ///
    /// A lone refresh token is not a usable session, so a missing access
    /// token yields `None`.
    pub fn get(&self) -> ClientResult<Option<CredentialPair>> {
        let Some(access) = self.read(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let refresh = self.read(REFRESH_TOKEN_KEY)?.unwrap_or_default();
        Ok(Some(CredentialPair::new(access, refresh)))
    }

    /// Remove both tokens. Clearing an empty holder is a no-op.
    pub fn clear(&self) -> ClientResult<()> {
        let conn = self.db.get()?;
        conn.execute(
            "DELETE FROM local_storage WHERE origin = ?1 AND key IN (?2, ?3)",
            params![self.origin, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY],
        )?;
        Ok(())
    }

    fn read(&self, key: &str) -> ClientResult<Option<String>> {
        let conn = self.db.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                params![self.origin, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
