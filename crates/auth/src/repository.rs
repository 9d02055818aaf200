use spaceduck_domain::model::{AuthToken, GatewaySettings, PairingSession};

/// Storage interface the auth store needs. Implemented against SQLite in
/// `spaceduck-store`; kept narrow so this crate never depends on a
/// particular engine.
#[async_trait::async_trait]
pub trait AuthRepository: Send + Sync + 'static {
    async fn get_gateway_settings(&self) -> spaceduck_domain::Result<Option<GatewaySettings>>;
    async fn save_gateway_settings(&self, settings: &GatewaySettings) -> spaceduck_domain::Result<()>;

    async fn insert_pairing_session(&self, session: &PairingSession) -> spaceduck_domain::Result<()>;
    async fn get_pairing_session(&self, id: &str) -> spaceduck_domain::Result<Option<PairingSession>>;
    async fn update_pairing_session(&self, session: &PairingSession) -> spaceduck_domain::Result<()>;
    /// The most recent pairing session that is neither used nor expired,
    /// if any — `/api/pair/start` reuses it instead of minting a new code.
    async fn find_active_pairing_session(
        &self,
    ) -> spaceduck_domain::Result<Option<PairingSession>>;

    async fn insert_token(&self, token: &AuthToken) -> spaceduck_domain::Result<()>;
    async fn get_token_by_hash(&self, hash: &[u8]) -> spaceduck_domain::Result<Option<AuthToken>>;
    async fn list_tokens(&self) -> spaceduck_domain::Result<Vec<AuthToken>>;
    async fn touch_token_last_used(&self, id: &str) -> spaceduck_domain::Result<()>;
    async fn revoke_token(&self, id: &str) -> spaceduck_domain::Result<()>;
}
