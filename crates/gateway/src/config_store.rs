//! Config Store (C1, §4.1): the only collaborator allowed to write
//! `spaceduck.config.json5`. Holds a cached, validated snapshot behind a
//! `parking_lot::RwLock` for lock-free reads, and serializes every mutation
//! (`patch`/`setSecret`/`unsetSecret`) through a single async write chain so
//! config revs are totally ordered (§5).

use parking_lot::RwLock;
use serde_json::Value;
use spaceduck_domain::config::{
    apply_patch, is_secret_path, rebuild_targets_for_path, rev_of, Config, ConfigSeverity, PatchOp,
    RebuildTarget, SecretStatus, SecretsDocument,
};
use spaceduck_domain::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Paths that change a listener the running process can't rebind without a
/// restart. Everything else that isn't a `RebuildTarget` is simply
/// effective immediately (no collaborator needs rebuilding).
// `/ai/model`/`/ai/pricing` rebuild the chat provider itself (handled by
// `PROVIDER_REBUILD_PATHS`/hot-swap) but the Task Scheduler snapshots
// both at boot for cost estimation and has no live-reload path yet, so
// a patch to either is flagged as needing a restart to take effect
// there.
const NEEDS_RESTART_PATHS: &[&str] = &["/server/port", "/server/host", "/ai/model", "/ai/pricing"];

#[derive(Clone)]
struct Snapshot {
    config: Config,
    secrets: SecretsDocument,
    doc: Value,
    rev: String,
}

/// Outcome of a successful `patch()` call: the new rev plus which
/// collaborators the hot-swap coordinator must rebuild (§4.9) and which
/// touched paths only take effect after a restart.
#[derive(Debug, Clone, Default)]
pub struct PatchOutcome {
    pub rev: String,
    pub rebuild: Vec<RebuildTarget>,
    pub needs_restart: Vec<String>,
}

pub struct ConfigStore {
    config_path: PathBuf,
    secrets_path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
    write_chain: AsyncMutex<()>,
}

impl ConfigStore {
    /// Load `spaceduck.config.json5` from `config_dir`, writing a validated
    /// default document if none exists yet. Fails only when the file is
    /// present but fails validation — a missing file is not an error.
    pub async fn load(config_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(config_dir).await?;
        let config_path = config_dir.join("spaceduck.config.json5");
        let secrets_path = config_dir.join("spaceduck.secrets.json");

        let config: Config = match tokio::fs::read_to_string(&config_path).await {
            Ok(raw) => json5::from_str(&raw).map_err(|e| Error::Validation(format!("{}: {e}", config_path.display())))?,
            Err(_) => Config::default(),
        };
        reject_on_error(&config)?;

        let secrets: SecretsDocument = match tokio::fs::read(&secrets_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => SecretsDocument::default(),
        };

        let doc = serde_json::to_value(&config)?;
        let rev = rev_of(&doc);

        let store = Self {
            config_path,
            secrets_path,
            snapshot: RwLock::new(Arc::new(Snapshot { config, secrets, doc, rev })),
            write_chain: AsyncMutex::new(()),
        };
        // Persist so a freshly defaulted config is visible on disk from the
        // first boot, in the canonical pretty-printed form.
        store.write_config_to_disk().await?;
        Ok(store)
    }

    pub fn current(&self) -> Config {
        self.snapshot.read().config.clone()
    }

    /// Read a single value out of the live document by JSON Pointer, for
    /// the `config_get`/`config_set` tools (§4.3) — never returns a secret
    /// value, since secrets live in a separate document entirely.
    pub fn get(&self, pointer: &str) -> Option<Value> {
        self.snapshot.read().doc.pointer(pointer).cloned()
    }

    pub fn rev(&self) -> String {
        self.snapshot.read().rev.clone()
    }

    /// `(document, rev, secretStatuses)` for `GET /api/config`. Secrets are
    /// never embedded in `document` — only the known-path/is-set index.
    pub fn get_redacted(&self) -> (Value, String, Vec<SecretStatus>) {
        let snap = self.snapshot.read().clone();
        (snap.doc.clone(), snap.rev, snap.secrets.redacted_index())
    }

    /// §4.1 `patch()`: reject on rev mismatch, reject secret-path ops,
    /// apply to a clone, re-validate, write atomically, classify the
    /// touched paths for the hot-swap coordinator.
    pub async fn patch(&self, ops: Vec<PatchOp>, expected_rev: &str) -> Result<PatchOutcome> {
        let _guard = self.write_chain.lock().await;
        let snap = self.snapshot.read().clone();

        if snap.rev != expected_rev {
            return Err(Error::Conflict {
                expected: expected_rev.to_string(),
                actual: snap.rev.clone(),
            });
        }
        for op in &ops {
            if is_secret_path(op.path()) {
                return Err(Error::InvalidOp(format!(
                    "{} is a secret path; use /api/config/secrets instead",
                    op.path()
                )));
            }
        }

        let mut doc = snap.doc.clone();
        apply_patch(&mut doc, &ops)?;

        let new_config: Config = serde_json::from_value(doc.clone())?;
        reject_on_error(&new_config)?;

        let new_rev = rev_of(&doc);
        self.write_atomic(&self.config_path, pretty_json(&doc)?.as_bytes()).await?;

        *self.snapshot.write() = Arc::new(Snapshot {
            config: new_config,
            secrets: snap.secrets.clone(),
            doc,
            rev: new_rev.clone(),
        });

        let mut rebuild: Vec<RebuildTarget> = Vec::new();
        let mut needs_restart: Vec<String> = Vec::new();
        for op in &ops {
            for target in rebuild_targets_for_path(op.path()) {
                if !rebuild.contains(&target) {
                    rebuild.push(target);
                }
            }
            if NEEDS_RESTART_PATHS.contains(&op.path()) {
                needs_restart.push(op.path().to_string());
            }
        }

        Ok(PatchOutcome { rev: new_rev, rebuild, needs_restart })
    }

    /// Only a known secret path is accepted. Triggers the same rebuild
    /// classification a config patch at that path would.
    pub async fn set_secret(&self, path: &str, value: &str) -> Result<Vec<RebuildTarget>> {
        if !is_secret_path(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        let _guard = self.write_chain.lock().await;
        let snap = self.snapshot.read().clone();
        let mut secrets = snap.secrets.clone();
        secrets.set(path, value.to_string());
        self.write_atomic(&self.secrets_path, &serde_json::to_vec_pretty(&secrets)?).await?;
        *self.snapshot.write() = Arc::new(Snapshot { secrets, ..(*snap).clone() });
        Ok(rebuild_targets_for_path(path))
    }

    pub async fn unset_secret(&self, path: &str) -> Result<Vec<RebuildTarget>> {
        if !is_secret_path(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        let _guard = self.write_chain.lock().await;
        let snap = self.snapshot.read().clone();
        let mut secrets = snap.secrets.clone();
        secrets.unset(path);
        self.write_atomic(&self.secrets_path, &serde_json::to_vec_pretty(&secrets)?).await?;
        *self.snapshot.write() = Arc::new(Snapshot { secrets, ..(*snap).clone() });
        Ok(rebuild_targets_for_path(path))
    }

    pub fn secrets(&self) -> SecretsDocument {
        self.snapshot.read().secrets.clone()
    }

    async fn write_config_to_disk(&self) -> Result<()> {
        let doc = self.snapshot.read().doc.clone();
        self.write_atomic(&self.config_path, pretty_json(&doc)?.as_bytes()).await
    }

    /// Sibling temp file + rename (§6): never leaves a half-written config
    /// on disk, even on crash mid-write.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Internal("config path has no file name".into()))?;
        let tmp = path.with_file_name(format!(
            "{file_name}.tmp-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4()
        ));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn reject_on_error(config: &Config) -> Result<()> {
    let errors = config.validate();
    let hard: Vec<_> = errors.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
    if hard.is_empty() {
        return Ok(());
    }
    Err(Error::Validation(
        hard.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "),
    ))
}

fn pretty_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_writes_defaults_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        assert!(dir.path().join("spaceduck.config.json5").exists());
        assert_eq!(store.current().ai.model, Config::default().ai.model);
    }

    #[tokio::test]
    async fn patch_rejects_stale_rev() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        let ops = vec![PatchOp::Replace {
            path: "/ai/model".into(),
            value: serde_json::json!("gpt-5"),
        }];
        let err = store.patch(ops, "not-the-rev").await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn patch_rejects_secret_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        let rev = store.rev();
        let ops = vec![PatchOp::Replace {
            path: "/ai/secrets/anthropicApiKey".into(),
            value: serde_json::json!("sk-whatever"),
        }];
        let err = store.patch(ops, &rev).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_OP");
    }

    #[tokio::test]
    async fn successful_patch_bumps_rev_and_flags_provider_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        let rev = store.rev();
        let ops = vec![PatchOp::Replace {
            path: "/ai/model".into(),
            value: serde_json::json!("gpt-5"),
        }];
        let outcome = store.patch(ops, &rev).await.unwrap();
        assert_ne!(outcome.rev, rev);
        assert_eq!(store.current().ai.model, "gpt-5");
        assert!(outcome.rebuild.contains(&RebuildTarget::Provider));
    }

    #[tokio::test]
    async fn repeating_an_already_applied_patch_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        let rev = store.rev();
        let ops = vec![PatchOp::Replace {
            path: "/ai/model".into(),
            value: serde_json::json!("gpt-5"),
        }];
        store.patch(ops.clone(), &rev).await.unwrap();
        let err = store.patch(ops, &rev).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn set_and_unset_secret_round_trip_leaves_config_rev_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path()).await.unwrap();
        let rev_before = store.rev();
        store.set_secret("/ai/secrets/anthropicApiKey", "sk-ant-test").await.unwrap();
        assert!(store.secrets().is_set("/ai/secrets/anthropicApiKey"));
        store.unset_secret("/ai/secrets/anthropicApiKey").await.unwrap();
        assert!(!store.secrets().is_set("/ai/secrets/anthropicApiKey"));
        assert_eq!(store.rev(), rev_before);
    }
}
