//! HAL that plays nothing but keeps time like real hardware would.
//!
//! Foreground durations come from WAV headers; completion is reported by
//! posting `hal.media.ended` onto the inbound bus after that duration, or
//! immediately when the channel is stopped. The background stream runs on a
//! simulated clock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{local_path, AudioHal, ForegroundChannel, PlayRequest};
use crate::bus::{topic, Message};
use crate::error::{AudioError, Result};

/// Duration of a WAV file, `None` for anything hound cannot read.
pub fn wav_duration(path: &Path) -> Option<Duration> {
    let reader = hound::WavReader::open(path).ok()?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(reader.duration() as f64 / rate as f64))
}

struct Playing {
    media_id: Option<String>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Background {
    playlist: Vec<String>,
    /// Total playlist length when every track's duration is known.
    length: Option<Duration>,
    /// Position accumulated before the current run started.
    elapsed: Duration,
    resumed_at: Option<Instant>,
    volume: f32,
    end_task: Option<JoinHandle<()>>,
}

impl Background {
    fn position(&self) -> Duration {
        self.elapsed + self.resumed_at.map(|at| at.elapsed()).unwrap_or_default()
    }

    fn halt(&mut self) {
        self.elapsed = self.position();
        self.resumed_at = None;
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }
}

pub struct SimulatedHal {
    inbound: mpsc::UnboundedSender<Message>,
    runtime: Handle,
    foreground: Mutex<HashMap<ForegroundChannel, Playing>>,
    background: Mutex<Background>,
}

impl SimulatedHal {
    /// Must be called from within a tokio runtime.
    pub fn new(inbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            inbound,
            runtime: Handle::current(),
            foreground: Mutex::new(HashMap::new()),
            background: Mutex::new(Background {
                volume: 1.0,
                ..Background::default()
            }),
        }
    }

    fn foreground(&self) -> MutexGuard<'_, HashMap<ForegroundChannel, Playing>> {
        self.foreground.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn background(&self) -> MutexGuard<'_, Background> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn background_volume(&self) -> f32 {
        self.background().volume
    }

    fn media_ended(channel: ForegroundChannel, media_id: Option<&str>) -> Message {
        Message::new(
            topic::HAL_MEDIA_ENDED,
            json!({
                "channel": u8::from(channel),
                "background": false,
                "media_id": media_id,
            }),
        )
    }

    fn background_ended() -> Message {
        Message::new(topic::HAL_MEDIA_ENDED, json!({ "background": true }))
    }

    fn post_after(&self, delay: Duration, message: Message) -> JoinHandle<()> {
        let inbound = self.inbound.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbound.send(message);
        })
    }

    fn schedule_background_end(&self, background: &mut Background) {
        if let Some(length) = background.length {
            let remaining = length.saturating_sub(background.elapsed);
            background.end_task = Some(self.post_after(remaining, Self::background_ended()));
        }
    }
}

impl AudioHal for SimulatedHal {
    fn play_foreground(&self, request: PlayRequest<'_>) -> Result<Option<Duration>> {
        if !request.path.is_file() {
            return Err(AudioError::MissingFile(request.path.to_path_buf()));
        }
        let duration = wav_duration(request.path);
        let media_id = request.media_id.map(str::to_string);

        let mut foreground = self.foreground();
        if let Some(previous) = foreground.remove(&request.channel) {
            previous.task.abort();
        }
        if let Some(duration) = duration {
            let task = self.post_after(
                duration,
                Self::media_ended(request.channel, media_id.as_deref()),
            );
            foreground.insert(request.channel, Playing { media_id, task });
        }

        debug!(
            channel = ?request.channel,
            volume = ?request.volume,
            "simulated playback of {} ({:?})",
            request.path.display(),
            duration
        );
        Ok(duration)
    }

    fn stop_foreground(&self, channel: ForegroundChannel) {
        if let Some(playing) = self.foreground().remove(&channel) {
            playing.task.abort();
            let _ = self
                .inbound
                .send(Self::media_ended(channel, playing.media_id.as_deref()));
        }
    }

    fn start_background(&self, playlist: &[String]) -> Result<()> {
        let mut length = Some(Duration::ZERO);
        for uri in playlist {
            let track = match local_path(uri) {
                Ok(path) => wav_duration(&path),
                Err(e) => {
                    warn!("simulated background cannot time {}: {}", uri, e);
                    None
                }
            };
            length = length.zip(track).map(|(total, track)| total + track);
        }

        let mut background = self.background();
        background.halt();
        background.playlist = playlist.to_vec();
        background.length = length;
        background.elapsed = Duration::ZERO;
        background.resumed_at = Some(Instant::now());
        self.schedule_background_end(&mut background);
        Ok(())
    }

    fn pause_background(&self) {
        self.background().halt();
    }

    fn resume_background(&self) {
        let mut background = self.background();
        if background.playlist.is_empty() || background.resumed_at.is_some() {
            return;
        }
        background.resumed_at = Some(Instant::now());
        self.schedule_background_end(&mut background);
    }

    fn stop_background(&self) {
        let mut background = self.background();
        background.halt();
        background.playlist.clear();
        background.length = None;
        background.elapsed = Duration::ZERO;
    }

    fn is_background_playing(&self) -> bool {
        self.background().resumed_at.is_some()
    }

    fn background_time_ms(&self) -> i64 {
        let background = self.background();
        if background.playlist.is_empty() {
            return -1;
        }
        background.position().as_millis() as i64
    }

    fn set_background_volume(&self, volume: f32) {
        self.background().volume = volume.clamp(0.0, 1.0);
    }

    fn shutdown(&self) {
        for (_, playing) in self.foreground().drain() {
            playing.task.abort();
        }
        self.stop_background();
    }
}
