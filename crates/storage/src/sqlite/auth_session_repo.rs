use async_trait::async_trait;
use portal_core::model::AuthToken;
use sqlx::Row;

use crate::repository::{AuthSessionRepository, PersistedSession, StorageError};

use super::SqliteRepository;
use super::mapping::{conn, identity_from_json, identity_to_json, parse_saved_at, ser};

#[async_trait]
impl AuthSessionRepository for SqliteRepository {
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT token, identity, saved_at
            FROM auth_session
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token: String = row.try_get("token").map_err(ser)?;
        let identity: String = row.try_get("identity").map_err(ser)?;
        let saved_at: String = row.try_get("saved_at").map_err(ser)?;

        Ok(Some(PersistedSession {
            token: AuthToken::new(token),
            identity: identity_from_json(&identity)?,
            saved_at: parse_saved_at(&saved_at)?,
        }))
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO auth_session (id, token, identity, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                token = excluded.token,
                identity = excluded.identity,
                saved_at = excluded.saved_at
            ",
        )
        .bind(1_i64)
        .bind(session.token.as_str())
        .bind(identity_to_json(&session.identity)?)
        .bind(session.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM auth_session WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
