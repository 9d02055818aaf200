use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedding provider configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    OpenaiCompat,
    Gemini,
    Local,
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        EmbeddingProvider::OpenaiCompat
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// When `false`, memory recall falls back to textual matching (§4.10).
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Vector width. Changing this forces the persistence layer to drop
    /// and rebuild the vector index (§4.9).
    #[serde(default = "d_dimensions")]
    pub dimensions: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: EmbeddingProvider::default(),
            model: d_model(),
            base_url: None,
            dimensions: d_dimensions(),
        }
    }
}

fn d_model() -> String {
    "text-embedding-3-small".into()
}
fn d_dimensions() -> u32 {
    1536
}

pub const EMBEDDING_REBUILD_PATHS: &[&str] = &[
    "/ai/provider",
    "/embedding/enabled",
    "/embedding/provider",
    "/embedding/model",
    "/embedding/baseUrl",
    "/embedding/dimensions",
];
