//! Boundary to the audio hardware abstraction layer.
//!
//! The orchestrator never decodes or mixes audio itself. It asks the HAL to
//! play files on a foreground channel or drive the background playlist, and
//! learns about completion through `hal.media.ended` events on the bus.

pub mod simulated;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

pub use simulated::SimulatedHal;

const FILE_SCHEME: &str = "file://";

/// Foreground output lines. At most one sound is active per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ForegroundChannel {
    Effect,
    Speech,
}

impl From<ForegroundChannel> for u8 {
    fn from(channel: ForegroundChannel) -> u8 {
        match channel {
            ForegroundChannel::Effect => 0,
            ForegroundChannel::Speech => 1,
        }
    }
}

impl TryFrom<u8> for ForegroundChannel {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(ForegroundChannel::Effect),
            1 => Ok(ForegroundChannel::Speech),
            other => Err(format!("unknown foreground channel {}", other)),
        }
    }
}

/// One foreground play request.
#[derive(Debug, Clone, Copy)]
pub struct PlayRequest<'a> {
    pub channel: ForegroundChannel,
    pub path: &'a Path,
    pub volume: Option<f32>,
    /// Echoed back in `hal.media.ended` so completion can be routed.
    pub media_id: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
}

impl<'a> PlayRequest<'a> {
    pub fn new(channel: ForegroundChannel, path: &'a Path) -> Self {
        Self {
            channel,
            path,
            volume: None,
            media_id: None,
            correlation_id: None,
        }
    }
}

pub trait AudioHal: Send + Sync {
    /// Starts playback and returns the media duration when the HAL knows it.
    fn play_foreground(&self, request: PlayRequest<'_>) -> Result<Option<Duration>>;

    /// Fire-and-forget stop of whatever is playing on `channel`.
    fn stop_foreground(&self, channel: ForegroundChannel);

    fn start_background(&self, playlist: &[String]) -> Result<()>;

    fn pause_background(&self);

    fn resume_background(&self);

    fn stop_background(&self);

    fn is_background_playing(&self) -> bool;

    /// Background position in milliseconds; negative when unknown.
    fn background_time_ms(&self) -> i64;

    fn set_background_volume(&self, volume: f32);

    fn shutdown(&self) {}
}

/// Maps a `file://` URI to a local path. Other schemes are rejected.
pub fn local_path(uri: &str) -> Result<PathBuf> {
    uri.strip_prefix(FILE_SCHEME)
        .map(PathBuf::from)
        .ok_or_else(|| AudioError::UnsupportedScheme(uri.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_maps_to_path() {
        assert_eq!(
            local_path("file:///tmp/a0.wav").unwrap(),
            PathBuf::from("/tmp/a0.wav")
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = local_path("https://example.com/a.mp3").unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedScheme(_)));
    }

    #[test]
    fn channel_codes_match_wire_format() {
        assert_eq!(serde_json::to_value(ForegroundChannel::Speech).unwrap(), 1);
        let effect: ForegroundChannel = serde_json::from_value(serde_json::json!(0)).unwrap();
        assert_eq!(effect, ForegroundChannel::Effect);
        assert!(serde_json::from_value::<ForegroundChannel>(serde_json::json!(7)).is_err());
    }
}
