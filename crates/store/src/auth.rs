use crate::connection::SqliteStore;
use rusqlite::{params, OptionalExtension};
use spaceduck_domain::model::{AuthToken, GatewaySettings, PairingSession};
use spaceduck_domain::Result;

#[async_trait::async_trait]
impl spaceduck_auth::AuthRepository for SqliteStore {
    async fn get_gateway_settings(&self) -> Result<Option<GatewaySettings>> {
        self.run_blocking(|conn| {
            conn.query_row(
                "SELECT id, name, created_at FROM gateway_settings LIMIT 1",
                [],
                |row| {
                    Ok(GatewaySettings {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn save_gateway_settings(&self, settings: &GatewaySettings) -> Result<()> {
        let settings = settings.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO gateway_settings (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![settings.id, settings.name, settings.created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_pairing_session(&self, session: &PairingSession) -> Result<()> {
        let session = session.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO pairing_sessions (id, code, created_at, expires_at, attempts, used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id,
                    session.code,
                    session.created_at,
                    session.expires_at,
                    session.attempts,
                    session.used_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_pairing_session(&self, id: &str) -> Result<Option<PairingSession>> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT id, code, created_at, expires_at, attempts, used_at
                 FROM pairing_sessions WHERE id = ?1",
                params![id],
                row_to_pairing_session,
            )
            .optional()
        })
        .await
    }

    async fn update_pairing_session(&self, session: &PairingSession) -> Result<()> {
        let session = session.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE pairing_sessions SET attempts = ?1, used_at = ?2 WHERE id = ?3",
                params![session.attempts, session.used_at, session.id],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_active_pairing_session(&self) -> Result<Option<PairingSession>> {
        self.run_blocking(|conn| {
            conn.query_row(
                "SELECT id, code, created_at, expires_at, attempts, used_at
                 FROM pairing_sessions
                 WHERE used_at IS NULL AND expires_at > datetime('now')
                 ORDER BY created_at DESC LIMIT 1",
                [],
                row_to_pairing_session,
            )
            .optional()
        })
        .await
    }

    async fn insert_token(&self, token: &AuthToken) -> Result<()> {
        let token = token.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO tokens (id, token_hash, device_name, created_at, last_used_at, revoked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    token.id,
                    token.token_hash,
                    token.device_name,
                    token.created_at,
                    token.last_used_at,
                    token.revoked_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_token_by_hash(&self, hash: &[u8]) -> Result<Option<AuthToken>> {
        let hash = hash.to_vec();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT id, token_hash, device_name, created_at, last_used_at, revoked_at
                 FROM tokens WHERE token_hash = ?1",
                params![hash],
                row_to_token,
            )
            .optional()
        })
        .await
    }

    async fn list_tokens(&self) -> Result<Vec<AuthToken>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, token_hash, device_name, created_at, last_used_at, revoked_at
                 FROM tokens ORDER BY created_at DESC",
            )?;
            stmt.query_map([], row_to_token)?.collect()
        })
        .await
    }

    async fn touch_token_last_used(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE tokens SET last_used_at = datetime('now') WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
    }

    async fn revoke_token(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE tokens SET revoked_at = datetime('now') WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
    }
}

fn row_to_pairing_session(row: &rusqlite::Row) -> rusqlite::Result<PairingSession> {
    Ok(PairingSession {
        id: row.get(0)?,
        code: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        attempts: row.get(4)?,
        used_at: row.get(5)?,
    })
}

fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        device_name: row.get(2)?,
        created_at: row.get(3)?,
        last_used_at: row.get(4)?,
        revoked_at: row.get(5)?,
    })
}
