//! Text-to-speech through a hosted synthesis API.

use std::path::Path;

use async_trait::async_trait;
use crickcast_core::error::CoreError;
use serde::Serialize;

pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";
pub const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2_5";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_22050_32";

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("speech API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("speech API returned no audio")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders text to an MP3 file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<(), SpeechError>;
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub base_url: String,
}

impl SpeechConfig {
    /// | Env Var               | Default                     |
    /// |-----------------------|-----------------------------|
    /// | `ELEVENLABS_API_KEY`  | required                    |
    /// | `ELEVENLABS_VOICE_ID` | `pNInz6obpgDQGcFmaJgB`      |
    /// | `ELEVENLABS_BASE_URL` | `https://api.elevenlabs.io` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ELEVENLABS_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("ELEVENLABS_API_KEY must be set".into()))?;
        Ok(Self {
            api_key,
            voice_id: lookup("ELEVENLABS_VOICE_ID").unwrap_or_else(|| DEFAULT_VOICE_ID.into()),
            model_id: DEFAULT_MODEL_ID.into(),
            output_format: DEFAULT_OUTPUT_FORMAT.into(),
            base_url: lookup("ELEVENLABS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ELEVENLABS_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
    speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.0,
            similarity_boost: 1.0,
            style: 0.0,
            use_speaker_boost: true,
            speed: 1.2,
        }
    }
}

pub struct ElevenLabsClient {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl ElevenLabsClient {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<(), SpeechError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.config.base_url, self.config.voice_id
            ))
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.config.api_key)
            .json(&TtsRequest {
                text,
                model_id: &self.config.model_id,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SpeechError::Empty);
        }
        tokio::fs::write(dest, &audio).await?;
        tracing::info!(dest = %dest.display(), bytes = audio.len(), "Saved commentary audio");
        Ok(())
    }
}
