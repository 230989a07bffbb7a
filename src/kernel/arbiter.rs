//! Foreground/background arbitration: sound effects and background ducking.
//!
//! Speech itself is scheduled by the speech loop; the arbiter only owns the
//! EFFECT channel and the background volume level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::AudioConfig;
use crate::error::{AudioError, Result};
use crate::hal::{self, AudioHal, ForegroundChannel, PlayRequest};

const FULL_VOLUME: f32 = 1.0;

pub struct ForegroundArbiter {
    hal: Arc<dyn AudioHal>,
    ducked_volume: f32,
    start_listening_uri: Option<String>,
    confirm_listening: bool,
    ducked: AtomicBool,
}

impl ForegroundArbiter {
    pub fn new(hal: Arc<dyn AudioHal>, config: &AudioConfig) -> Self {
        Self {
            hal,
            ducked_volume: config.ducked_volume(),
            start_listening_uri: config.start_listening_uri(),
            confirm_listening: config.confirm_listening,
            ducked: AtomicBool::new(false),
        }
    }

    /// Lowers the background to the ducked level. Level-based: repeated
    /// calls leave the volume where it is.
    pub fn duck(&self) {
        self.hal.set_background_volume(self.ducked_volume);
        self.ducked.store(true, Ordering::Release);
        info!("Ducked volume");
    }

    pub fn unduck(&self) {
        self.hal.set_background_volume(FULL_VOLUME);
        self.ducked.store(false, Ordering::Release);
        info!("Unducked volume");
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked.load(Ordering::Acquire)
    }

    /// Plays the start-listening confirmation sound, if configured.
    pub fn confirm_listening(&self) -> Result<()> {
        match (&self.start_listening_uri, self.confirm_listening) {
            (Some(uri), true) => self.play_effect(uri, None, None),
            _ => Ok(()),
        }
    }

    /// Fire-and-forget one-shot on the EFFECT channel. `session_id` is
    /// attribution only.
    pub fn play_effect(
        &self,
        uri: &str,
        volume: Option<f32>,
        session_id: Option<&str>,
    ) -> Result<()> {
        let path = hal::local_path(uri)?;
        if !path.is_file() {
            return Err(AudioError::MissingFile(path));
        }

        let request = PlayRequest {
            volume,
            correlation_id: session_id,
            ..PlayRequest::new(ForegroundChannel::Effect, &path)
        };
        self.hal.play_foreground(request)?;
        info!("Played sound: {}", uri);
        Ok(())
    }
}
