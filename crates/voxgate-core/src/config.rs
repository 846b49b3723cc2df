//! Configuration management for voxgate.
//!
//! This module provides configuration that doesn't depend on the audio
//! backend or the recognition engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Language used when neither the config nor the environment names one.
const FALLBACK_LOCALE: &str = "ko";

/// Configuration for the capture session and the on-device recognizer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Recognition language (ISO 639-1 code)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Whisper model name, e.g. "base-q8"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Explicit path to a model file, overriding `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Frames quieter than this (dBFS) count as silence
    #[serde(
        default = "default_silence_threshold_db",
        skip_serializing_if = "is_default_silence_threshold_db"
    )]
    pub silence_threshold_db: f32,

    /// Trailing silence after speech that ends the utterance (milliseconds)
    #[serde(
        default = "default_end_of_speech_ms",
        skip_serializing_if = "is_default_end_of_speech_ms"
    )]
    pub end_of_speech_ms: u64,

    /// Longest utterance accepted before recognition is forced (seconds)
    #[serde(
        default = "default_max_utterance_secs",
        skip_serializing_if = "is_default_max_utterance_secs"
    )]
    pub max_utterance_secs: f32,
}

fn default_silence_threshold_db() -> f32 {
    -45.0
}

fn is_default_silence_threshold_db(v: &f32) -> bool {
    (*v - default_silence_threshold_db()).abs() < f32::EPSILON
}

fn default_end_of_speech_ms() -> u64 {
    1200
}

fn is_default_end_of_speech_ms(v: &u64) -> bool {
    *v == default_end_of_speech_ms()
}

fn default_max_utterance_secs() -> f32 {
    15.0
}

fn is_default_max_utterance_secs(v: &f32) -> bool {
    (*v - default_max_utterance_secs()).abs() < f32::EPSILON
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: None,
            model: None,
            model_path: None,
            silence_threshold_db: default_silence_threshold_db(),
            end_of_speech_ms: default_end_of_speech_ms(),
            max_utterance_secs: default_max_utterance_secs(),
        }
    }
}

impl Config {
    /// Get the recognition language.
    ///
    /// Uses the configured locale, then the language part of `LANG`
    /// (e.g. "en" from "en_US.UTF-8"), then Korean.
    pub fn locale(&self) -> String {
        if let Some(locale) = self.locale.as_deref() {
            return locale.to_string();
        }
        std::env::var("LANG")
            .ok()
            .and_then(|lang| language_from_env(&lang))
            .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
    }

    /// Get the model name
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Get the model path override
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Get the trailing silence that ends an utterance
    pub fn end_of_speech(&self) -> Duration {
        Duration::from_millis(self.end_of_speech_ms)
    }

    /// Get the utterance length cap
    pub fn max_utterance(&self) -> Duration {
        Duration::try_from_secs_f32(self.max_utterance_secs).unwrap_or_else(|e| {
            let fallback = default_max_utterance_secs();
            warn!(
                value = self.max_utterance_secs,
                fallback, "Invalid max_utterance_secs ({}), using default", e
            );
            Duration::from_secs_f32(fallback)
        })
    }
}

fn language_from_env(lang: &str) -> Option<String> {
    let code = lang.split(['_', '.', '-']).next()?;
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_lowercase())
    } else {
        None
    }
}

/// Returns the directory where model files are kept.
pub fn models_dir() -> Result<PathBuf> {
    let data_dir = data_dir().context("Failed to retrieve data directory")?;
    Ok(data_dir.join(APP_NAME).join("models"))
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.end_of_speech_ms == 0 {
            warn!("end_of_speech_ms is 0, utterances will end on the first silent frame");
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
