//! SQLite-backed persistence for the gateway (§3, §4.8, §4.10, §4.12).
//!
//! A single [`SqliteStore`] connection implements every repository trait
//! the rest of the workspace depends on: `spaceduck_auth::AuthRepository`
//! plus the [`ConversationRepository`], [`MemoryRepository`], and
//! [`TaskRepository`] traits defined here. Callers depend on the traits,
//! not this crate, so a different engine could stand in without touching
//! business logic.

mod auth;
mod connection;
mod conversations;
mod memory;
mod migrations;
mod tasks;

pub use connection::SqliteStore;
pub use conversations::ConversationRepository;
pub use memory::MemoryRepository;
pub use tasks::TaskRepository;

#[cfg(test)]
mod tests {
    use super::*;
    use spaceduck_auth::AuthRepository;
    use spaceduck_domain::model::GatewaySettings;
    use chrono::Utc;

    #[tokio::test]
    async fn fresh_store_has_no_gateway_settings() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        assert!(store.get_gateway_settings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_gateway_settings_round_trip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let settings = GatewaySettings {
            id: uuid::Uuid::new_v4().to_string(),
            name: "living room duck".into(),
            created_at: Utc::now(),
        };
        store.save_gateway_settings(&settings).await.unwrap();
        let reloaded = store.get_gateway_settings().await.unwrap().unwrap();
        assert_eq!(reloaded.name, "living room duck");
    }

    #[tokio::test]
    async fn conversation_and_message_round_trip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let conv = store.create_conversation(Some("groceries".into())).await.unwrap();

        let message = spaceduck_domain::model::ConversationMessage::new(
            conv.id.clone(),
            spaceduck_domain::tool::Role::User,
            "remind me to buy milk",
        );
        store.append_message(&message).await.unwrap();

        let messages = store.list_messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "remind me to buy milk");

        let reloaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert!(reloaded.last_active_at >= conv.created_at);
    }
}
