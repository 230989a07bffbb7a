//! Background stream controller.
//!
//! Only the session that started the current playlist may pause, resume or
//! stop it; controls carrying any other id are ignored without an event.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::hal::AudioHal;
use crate::kernel::event::{EventSender, OutboundEvent, SessionId, Track};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub owner: Option<SessionId>,
    pub playlist: Vec<String>,
    pub paused: bool,
}

pub struct BackgroundStream {
    hal: Arc<dyn AudioHal>,
    events: EventSender,
    state: Mutex<StreamState>,
}

impl BackgroundStream {
    pub fn new(hal: Arc<dyn AudioHal>, events: EventSender) -> Self {
        Self {
            hal,
            events,
            state: Mutex::new(StreamState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> StreamState {
        self.lock().clone()
    }

    pub fn owner(&self) -> Option<SessionId> {
        self.lock().owner.clone()
    }

    /// Replaces whatever is playing with `tracks`, owned by `session_id`.
    pub fn play(&self, session_id: Option<SessionId>, tracks: &[Track]) -> Result<()> {
        if tracks.is_empty() {
            warn!("Play request without tracks (session={:?})", session_id);
            return Ok(());
        }
        let playlist: Vec<String> = tracks.iter().map(|t| t.uri().to_string()).collect();

        self.hal.stop_background();
        self.hal.start_background(&playlist)?;

        info!(
            "Playing background stream: {:?} (session={:?})",
            playlist, session_id
        );
        {
            let mut state = self.lock();
            state.owner = session_id.clone();
            state.playlist = playlist;
            state.paused = false;
        }
        self.events.emit(OutboundEvent::StreamPlaying { session_id })
    }

    pub fn pause(&self, session_id: Option<SessionId>) -> Result<bool> {
        if !self.set_paused(&session_id, true) {
            return Ok(false);
        }
        debug!("Pausing background stream (session={:?})", session_id);
        self.hal.pause_background();
        self.events.emit(OutboundEvent::StreamPaused { session_id })?;
        Ok(true)
    }

    pub fn resume(&self, session_id: Option<SessionId>) -> Result<bool> {
        if !self.set_paused(&session_id, false) {
            return Ok(false);
        }
        debug!("Resuming background stream (session={:?})", session_id);
        self.hal.resume_background();
        self.events.emit(OutboundEvent::StreamResumed { session_id })?;
        Ok(true)
    }

    /// Stop is a pause so the stream can be resumed from the same position
    /// later; callers still see `service.stopped`.
    pub fn stop(&self, session_id: Option<SessionId>) -> Result<bool> {
        if !self.set_paused(&session_id, true) {
            return Ok(false);
        }
        debug!("Stopping background stream (session={:?})", session_id);
        self.hal.pause_background();
        self.events.emit(OutboundEvent::StreamStopped { session_id })?;
        Ok(true)
    }

    /// The HAL finished the background playlist.
    pub fn media_ended(&self) -> Result<()> {
        info!("Background stream finished");
        let session_id = self.owner();
        self.events.emit(OutboundEvent::QueueEnd { session_id })
    }

    /// Emits the current position while the stream is playing and the HAL
    /// knows where it is.
    pub fn report_position(&self) -> Result<()> {
        if !self.hal.is_background_playing() {
            return Ok(());
        }
        let position_ms = self.hal.background_time_ms();
        if position_ms < 0 {
            return Ok(());
        }
        let session_id = self.owner();
        self.events.emit(OutboundEvent::StreamPosition {
            session_id,
            position_ms,
        })
    }

    /// Applies `paused` if `session_id` owns the stream.
    fn set_paused(&self, session_id: &Option<SessionId>, paused: bool) -> bool {
        let mut state = self.lock();
        if state.owner != *session_id {
            debug!(
                "Ignoring stream control for {:?}, owner is {:?}",
                session_id, state.owner
            );
            return false;
        }
        state.paused = paused;
        true
    }
}
