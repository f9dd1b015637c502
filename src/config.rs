use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_VOICE: &str = "Algenib";

/// Immutable provider configuration, built once at startup and passed by
/// reference to whatever needs it.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub tts_model: String,
    pub voice: String,
}

impl CoreConfig {
    /// Read configuration from the environment. `GEMINI_KEY` is required;
    /// everything else has a default.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_KEY").context("GEMINI_KEY is not set")?;
        Ok(Self {
            api_key,
            base_url: env::var("GEMINI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            text_model: env::var("TEXT_MODEL").unwrap_or_else(|_| DEFAULT_TEXT_MODEL.into()),
            image_model: env::var("IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.into()),
            tts_model: env::var("TTS_MODEL").unwrap_or_else(|_| DEFAULT_TTS_MODEL.into()),
            voice: env::var("TTS_VOICE").unwrap_or_else(|_| DEFAULT_VOICE.into()),
        })
    }

    /// Like `from_env`, after loading a `.env` file if one exists at the
    /// given path.
    pub fn load(env_file: &Path) -> Result<Self> {
        if env_file.exists() {
            dotenvy::from_path(env_file).ok();
            info!("Loaded .env from {}", env_file.display());
        }
        Self::from_env()
    }

    /// A config for tests and stubbed providers.
    pub fn for_tests() -> Self {
        Self {
            api_key: "test-key".into(),
            base_url: DEFAULT_BASE_URL.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            tts_model: DEFAULT_TTS_MODEL.into(),
            voice: DEFAULT_VOICE.into(),
        }
    }
}
