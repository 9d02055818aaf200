use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speech-to-text backend configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttBackend {
    Whisper,
    AwsTranscribe,
    None,
}

impl Default for SttBackend {
    fn default() -> Self {
        SttBackend::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SttConfig {
    #[serde(default)]
    pub backend: SttBackend,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default)]
    pub aws_transcribe: AwsTranscribeConfig,
    /// Hard wall-clock timeout for a single transcription call.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: SttBackend::default(),
            model: d_model(),
            aws_transcribe: AwsTranscribeConfig::default(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AwsTranscribeConfig {
    #[serde(default)]
    pub region: Option<String>,
}

fn d_model() -> String {
    "base".into()
}
fn d_timeout_ms() -> u64 {
    5 * 60 * 1000
}

pub const STT_REBUILD_PATHS: &[&str] = &[
    "/stt/backend",
    "/stt/model",
    "/stt/awsTranscribe/region",
];
