//! Adapts [`crate::config_store::ConfigStore`] to the narrow
//! `spaceduck_tools::seams::ConfigStore` trait the `config_get`/`config_set`
//! tools depend on (§4.3), routing a tool-driven write through the same
//! patch path `PATCH /api/config` uses so it picks up rev bumping and
//! hot-swap rebuilds identically.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use serde_json::Value;
use spaceduck_domain::config::{is_secret_path, PatchOp};
use spaceduck_domain::error::Result;

use crate::config_store::ConfigStore;
use crate::hotswap::HotswapCoordinator;

/// `hotswap` is filled in by bootstrap right after the coordinator is built
/// — this seam is itself one of the coordinator's `tool_deps`, so the
/// coordinator can't exist yet at the point this seam is constructed. A
/// `config_set` call that somehow races bootstrap just skips the rebuild
/// step; `patch()` has already taken effect either way.
pub struct ConfigToolSeam {
    config: Arc<ConfigStore>,
    hotswap: Arc<OnceLock<Weak<HotswapCoordinator>>>,
}

impl ConfigToolSeam {
    pub fn new(config: Arc<ConfigStore>, hotswap: Arc<OnceLock<Weak<HotswapCoordinator>>>) -> Self {
        Self { config, hotswap }
    }
}

#[async_trait]
impl spaceduck_tools::seams::ConfigStore for ConfigToolSeam {
    fn get(&self, pointer: &str) -> Option<Value> {
        self.config.get(pointer)
    }

    async fn set(&self, pointer: &str, value: Value) -> Result<()> {
        let rev = self.config.rev();
        let ops = vec![PatchOp::Replace { path: pointer.to_string(), value }];
        let outcome = self.config.patch(ops, &rev).await?;
        if let Some(hotswap) = self.hotswap.get().and_then(Weak::upgrade) {
            hotswap.apply(&outcome.rebuild).await;
        }
        Ok(())
    }

    fn is_secret_path(&self, pointer: &str) -> bool {
        is_secret_path(pointer)
    }
}
