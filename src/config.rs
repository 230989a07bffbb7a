//! Orchestrator configuration, loaded from TOML.
//!
//! Every field has a default so an empty file (or no file at all) yields a
//! working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AudioError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub listener: ListenerConfig,
    pub sounds: SoundsConfig,
    /// Play `sounds.start_listening` when listening begins.
    pub confirm_listening: bool,
    pub speech: SpeechConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Fraction of background volume removed while ducked (0.0 - 1.0).
    pub duck_while_listening: f32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            duck_while_listening: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    pub start_listening: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Extra wait after a chunk's reported duration before giving up on the
    /// hardware's finished notification.
    pub grace_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { grace_ms: 500 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub position_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 1000,
        }
    }
}

impl AudioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AudioConfig =
            toml::from_str(content).map_err(|e| AudioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let duck = self.listener.duck_while_listening;
        if !(0.0..=1.0).contains(&duck) {
            return Err(AudioError::Config(format!(
                "listener.duck_while_listening must be within 0.0..=1.0, got {}",
                duck
            )));
        }
        if self.stream.position_interval_ms == 0 {
            return Err(AudioError::Config(
                "stream.position_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Background volume applied while ducked.
    pub fn ducked_volume(&self) -> f32 {
        1.0 - self.listener.duck_while_listening
    }

    pub fn speech_grace(&self) -> Duration {
        Duration::from_millis(self.speech.grace_ms)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.stream.position_interval_ms)
    }

    /// `file://` URI of the confirmation sound, if one is configured.
    pub fn start_listening_uri(&self) -> Option<String> {
        self.sounds
            .start_listening
            .as_ref()
            .map(|path| format!("file://{}", path.display()))
    }
}
