use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::cli::Cli;
use crate::rewrite::DEFAULT_PROMPT;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_HOTKEY: &str = "ctrl+f13";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Capture retry tuning. Simulated keystrokes race the target application's
/// own clipboard update, so the settle delay is an explicit, tunable parameter
/// rather than a magic constant; each attempt waits `settle_ms * attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub attempts: u32,
    pub settle_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            settle_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub model: String,
    pub hotkey: String,
    pub prompt: String,
    pub api_url: String,
    pub capture: CaptureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            hotkey: DEFAULT_HOTKEY.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Config {
    /// Builds the effective configuration: config file values (if any) over
    /// the defaults, CLI flags over both, OPENAI_API_KEY as the credential
    /// fallback. A missing credential is a startup error.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };

        if let Some(api_key) = cli.api_key {
            config.api_key = api_key;
        }
        if let Some(model) = cli.model {
            config.model = model;
        }
        if let Some(hotkey) = cli.hotkey {
            config.hotkey = hotkey;
        }
        if let Some(prompt) = cli.prompt {
            config.prompt = prompt;
        }
        if let Some(api_url) = cli.api_url {
            config.api_url = api_url;
        }
        if let Some(attempts) = cli.attempts {
            config.capture.attempts = attempts.max(1);
        }
        if let Some(settle_ms) = cli.settle_ms {
            config.capture.settle_ms = settle_ms;
        }

        if config.api_key.is_empty() {
            if let Ok(key) = env::var("OPENAI_API_KEY") {
                config.api_key = key;
            }
        }

        if config.api_key.trim().is_empty() {
            anyhow::bail!(
                "API key not provided via --api-key, config file, or OPENAI_API_KEY"
            );
        }

        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
