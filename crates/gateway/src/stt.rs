//! Speech-to-text backend seam. The config layer (`SttConfig`) already
//! carries backend selection (§4.9's STT rebuild paths), but no concrete
//! Whisper/AWS Transcribe client lives in this workspace's dependency
//! stack — `Transcriber` is the seam a real backend plugs into; until one
//! is wired up, every backend reports `STT_UNAVAILABLE` (§7's resource
//! error category), matching the config's `SttBackend::None` default.

use spaceduck_domain::config::SttConfig;
use spaceduck_domain::error::{Error, Result};

#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &std::path::Path, config: &SttConfig) -> Result<String>;
}

pub struct UnavailableTranscriber;

#[async_trait::async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn transcribe(&self, _audio_path: &std::path::Path, _config: &SttConfig) -> Result<String> {
        Err(Error::Internal("STT_UNAVAILABLE".into()))
    }
}
