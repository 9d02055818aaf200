use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Known secret paths
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every path a secret may live at. Closed set — `patch()` rejects any op
/// that targets one of these, `setSecret`/`unsetSecret` accept only these.
pub const KNOWN_SECRET_PATHS: &[&str] = &[
    "/ai/secrets/anthropicApiKey",
    "/ai/secrets/openaiApiKey",
    "/ai/secrets/geminiApiKey",
    "/ai/secrets/bedrockAccessKeyId",
    "/ai/secrets/bedrockSecretAccessKey",
    "/embedding/secrets/apiKey",
    "/tools/secrets/braveApiKey",
    "/tools/secrets/perplexityApiKey",
    "/tools/secrets/openrouterApiKey",
    "/stt/secrets/awsAccessKeyId",
    "/stt/secrets/awsSecretAccessKey",
];

pub fn is_known_secret_path(path: &str) -> bool {
    KNOWN_SECRET_PATHS.contains(&path)
}

/// Whether a JSON Pointer path lies under any of the secret paths above
/// (covers both exact matches and the `/ai/secrets` prefix itself).
pub fn is_secret_path(path: &str) -> bool {
    KNOWN_SECRET_PATHS.iter().any(|known| known == &path)
        || path == "/ai/secrets"
        || path == "/embedding/secrets"
        || path == "/tools/secrets"
        || path == "/stt/secrets"
}

/// Secrets are persisted separately from the main config document so they
/// never enter the canonical serialization used to compute `rev()`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsDocument {
    #[serde(flatten)]
    pub values: HashMap<String, String>,
}

impl SecretsDocument {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.values.get(path).map(String::as_str)
    }

    pub fn set(&mut self, path: &str, value: String) {
        self.values.insert(path.to_string(), value);
    }

    pub fn unset(&mut self, path: &str) {
        self.values.remove(path);
    }

    pub fn is_set(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// `{path, isSet}` pairs for every known secret, for `getRedacted()`.
    pub fn redacted_index(&self) -> Vec<SecretStatus> {
        KNOWN_SECRET_PATHS
            .iter()
            .map(|path| SecretStatus {
                path: path.to_string(),
                is_set: self.is_set(path),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStatus {
    pub path: String,
    pub is_set: bool,
}
