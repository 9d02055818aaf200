use crate::repository::AuthRepository;
use crate::{generate_pairing_code, generate_raw_token, hashes_equal, sha256_hex};
use chrono::{Duration, Utc};
use spaceduck_domain::model::{AuthToken, GatewaySettings, PairingSession};
use spaceduck_domain::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Result of `POST /api/pair/start`.
#[derive(Debug, Clone)]
pub struct PairingStartResult {
    pub pairing_id: String,
    pub code: String,
}

/// Outcome of `confirmPairing`, matching the state list in spec §4.2.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Ok {
        token: String,
        gateway_id: String,
        gateway_name: String,
    },
    NotFound,
    AlreadyUsed,
    Expired,
    RateLimited,
    WrongCode,
}

pub struct AuthStore<R: AuthRepository> {
    repo: Arc<R>,
}

impl<R: AuthRepository> AuthStore<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// One-time init: assign a stable gateway id and name if none exists yet.
    pub async fn ensure_gateway_settings(&self) -> Result<GatewaySettings> {
        if let Some(existing) = self.repo.get_gateway_settings().await? {
            return Ok(existing);
        }
        let settings = GatewaySettings {
            id: Uuid::new_v4().to_string(),
            name: format!("spaceduck-{}", &Uuid::new_v4().to_string()[..8]),
            created_at: Utc::now(),
        };
        self.repo.save_gateway_settings(&settings).await?;
        tracing::info!(gateway_id = %settings.id, "gateway identity initialized");
        Ok(settings)
    }

    pub async fn create_pairing_session(&self) -> Result<PairingStartResult> {
        if let Some(active) = self.repo.find_active_pairing_session().await? {
            return Ok(PairingStartResult {
                pairing_id: active.id,
                code: active.code,
            });
        }
        let now = Utc::now();
        let session = PairingSession {
            id: Uuid::new_v4().to_string(),
            code: generate_pairing_code(),
            created_at: now,
            expires_at: now + Duration::seconds(PairingSession::TTL_SECONDS),
            attempts: 0,
            used_at: None,
        };
        self.repo.insert_pairing_session(&session).await?;
        Ok(PairingStartResult {
            pairing_id: session.id,
            code: session.code,
        })
    }

    pub async fn confirm_pairing(
        &self,
        pairing_id: &str,
        code: &str,
        device_name: Option<String>,
    ) -> Result<ConfirmOutcome> {
        let Some(mut session) = self.repo.get_pairing_session(pairing_id).await? else {
            return Ok(ConfirmOutcome::NotFound);
        };
        if session.used_at.is_some() {
            return Ok(ConfirmOutcome::AlreadyUsed);
        }
        if session.is_expired(Utc::now()) {
            return Ok(ConfirmOutcome::Expired);
        }
        if session.is_rate_limited() {
            return Ok(ConfirmOutcome::RateLimited);
        }
        if session.code != code {
            session.attempts += 1;
            self.repo.update_pairing_session(&session).await?;
            if session.is_rate_limited() {
                return Ok(ConfirmOutcome::RateLimited);
            }
            return Ok(ConfirmOutcome::WrongCode);
        }

        session.used_at = Some(Utc::now());
        self.repo.update_pairing_session(&session).await?;

        let raw_token = generate_raw_token();
        let token = AuthToken {
            id: Uuid::new_v4().to_string(),
            token_hash: sha256_hex(&raw_token),
            device_name,
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        self.repo.insert_token(&token).await?;

        let settings = self.ensure_gateway_settings().await?;
        Ok(ConfirmOutcome::Ok {
            token: raw_token,
            gateway_id: settings.id,
            gateway_name: settings.name,
        })
    }

    /// Looks up the token by the hash of `raw`, rejects revoked tokens, and
    /// bumps `lastUsedAt` on success.
    pub async fn verify_token(&self, raw: &str) -> Result<Option<AuthToken>> {
        let hash = sha256_hex(raw);
        let Some(token) = self.repo.get_token_by_hash(&hash).await? else {
            return Ok(None);
        };
        if !hashes_equal(&token.token_hash, &hash) {
            return Ok(None);
        }
        if token.is_revoked() {
            return Ok(None);
        }
        self.repo.touch_token_last_used(&token.id).await?;
        Ok(Some(token))
    }

    pub async fn revoke_token(&self, id: &str) -> Result<()> {
        self.repo.revoke_token(id).await
    }

    pub async fn list_tokens(&self) -> Result<Vec<AuthToken>> {
        self.repo.list_tokens().await
    }

    /// When auth is disabled, callers get a synthetic always-valid token so
    /// downstream code stays uniform. A loud warning is logged once at
    /// startup by the caller (bootstrap), not here.
    pub fn synthetic_token() -> AuthToken {
        AuthToken {
            id: "synthetic".into(),
            token_hash: Vec::new(),
            device_name: Some("auth-disabled".into()),
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemRepo {
        settings: Mutex<Option<GatewaySettings>>,
        pairing: Mutex<HashMap<String, PairingSession>>,
        tokens: Mutex<HashMap<String, AuthToken>>,
    }

    #[async_trait::async_trait]
    impl AuthRepository for MemRepo {
        async fn get_gateway_settings(&self) -> Result<Option<GatewaySettings>> {
            Ok(self.settings.lock().clone())
        }
        async fn save_gateway_settings(&self, settings: &GatewaySettings) -> Result<()> {
            *self.settings.lock() = Some(settings.clone());
            Ok(())
        }
        async fn insert_pairing_session(&self, session: &PairingSession) -> Result<()> {
            self.pairing.lock().insert(session.id.clone(), session.clone());
            Ok(())
        }
        async fn get_pairing_session(&self, id: &str) -> Result<Option<PairingSession>> {
            Ok(self.pairing.lock().get(id).cloned())
        }
        async fn update_pairing_session(&self, session: &PairingSession) -> Result<()> {
            self.pairing.lock().insert(session.id.clone(), session.clone());
            Ok(())
        }
        async fn find_active_pairing_session(&self) -> Result<Option<PairingSession>> {
            let now = Utc::now();
            Ok(self
                .pairing
                .lock()
                .values()
                .find(|s| s.used_at.is_none() && !s.is_expired(now))
                .cloned())
        }
        async fn insert_token(&self, token: &AuthToken) -> Result<()> {
            self.tokens.lock().insert(token.id.clone(), token.clone());
            Ok(())
        }
        async fn get_token_by_hash(&self, hash: &[u8]) -> Result<Option<AuthToken>> {
            Ok(self
                .tokens
                .lock()
                .values()
                .find(|t| t.token_hash == hash)
                .cloned())
        }
        async fn list_tokens(&self) -> Result<Vec<AuthToken>> {
            Ok(self.tokens.lock().values().cloned().collect())
        }
        async fn touch_token_last_used(&self, id: &str) -> Result<()> {
            if let Some(t) = self.tokens.lock().get_mut(id) {
                t.last_used_at = Some(Utc::now());
            }
            Ok(())
        }
        async fn revoke_token(&self, id: &str) -> Result<()> {
            if let Some(t) = self.tokens.lock().get_mut(id) {
                t.revoked_at = Some(Utc::now());
            }
            Ok(())
        }
    }

    fn store() -> AuthStore<MemRepo> {
        AuthStore::new(Arc::new(MemRepo::default()))
    }

    #[tokio::test]
    async fn pairing_happy_path_issues_verifiable_token() {
        let store = store();
        let start = store.create_pairing_session().await.unwrap();
        let outcome = store
            .confirm_pairing(&start.pairing_id, &start.code, Some("laptop".into()))
            .await
            .unwrap();
        let token = match outcome {
            ConfirmOutcome::Ok { token, .. } => token,
            other => panic!("expected Ok, got {other:?}"),
        };
        let verified = store.verify_token(&token).await.unwrap();
        assert!(verified.is_some());
    }

    #[tokio::test]
    async fn start_reuses_active_session() {
        let store = store();
        let first = store.create_pairing_session().await.unwrap();
        let second = store.create_pairing_session().await.unwrap();
        assert_eq!(first.pairing_id, second.pairing_id);
        assert_eq!(first.code, second.code);
    }

    #[tokio::test]
    async fn wrong_code_five_times_then_rate_limited() {
        let store = store();
        let start = store.create_pairing_session().await.unwrap();
        for _ in 0..5 {
            let outcome = store
                .confirm_pairing(&start.pairing_id, "000000", None)
                .await
                .unwrap();
            assert!(matches!(
                outcome,
                ConfirmOutcome::WrongCode | ConfirmOutcome::RateLimited
            ));
        }
        let sixth = store
            .confirm_pairing(&start.pairing_id, &start.code, None)
            .await
            .unwrap();
        assert!(matches!(sixth, ConfirmOutcome::RateLimited));
    }

    #[tokio::test]
    async fn confirming_twice_is_already_used() {
        let store = store();
        let start = store.create_pairing_session().await.unwrap();
        store
            .confirm_pairing(&start.pairing_id, &start.code, None)
            .await
            .unwrap();
        let second = store
            .confirm_pairing(&start.pairing_id, &start.code, None)
            .await
            .unwrap();
        assert!(matches!(second, ConfirmOutcome::AlreadyUsed));
    }

    #[tokio::test]
    async fn unknown_pairing_id_is_not_found() {
        let store = store();
        let outcome = store
            .confirm_pairing("does-not-exist", "123456", None)
            .await
            .unwrap();
        assert!(matches!(outcome, ConfirmOutcome::NotFound));
    }

    #[tokio::test]
    async fn revoked_token_fails_verification() {
        let store = store();
        let start = store.create_pairing_session().await.unwrap();
        let outcome = store
            .confirm_pairing(&start.pairing_id, &start.code, None)
            .await
            .unwrap();
        let token = match outcome {
            ConfirmOutcome::Ok { token, .. } => token,
            other => panic!("expected Ok, got {other:?}"),
        };
        let tokens = store.list_tokens().await.unwrap();
        store.revoke_token(&tokens[0].id).await.unwrap();
        assert!(store.verify_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ensure_gateway_settings_is_idempotent() {
        let store = store();
        let first = store.ensure_gateway_settings().await.unwrap();
        let second = store.ensure_gateway_settings().await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
