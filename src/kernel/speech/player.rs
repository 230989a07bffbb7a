//! Speech playback loop.
//!
//! A single task drains the session registry one chunk per wake, so chunks of
//! one session play in push order and never interleave with another
//! session's chunks.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::hal::{self, AudioHal, ForegroundChannel, PlayRequest};
use crate::kernel::event::{EventSender, OutboundEvent};
use crate::kernel::state::{Session, SessionRegistry};

use super::chunk::SpeechChunk;

pub struct SpeechPlayer {
    registry: Arc<SessionRegistry>,
    hal: Arc<dyn AudioHal>,
    events: EventSender,
    grace: Duration,
}

impl SpeechPlayer {
    pub fn new(
        registry: Arc<SessionRegistry>,
        hal: Arc<dyn AudioHal>,
        events: EventSender,
        grace: Duration,
    ) -> Self {
        Self {
            registry,
            hal,
            events,
            grace,
        }
    }

    /// Runs until the registry stops running. A failed wake is logged and
    /// never ends the loop.
    pub async fn run(self) {
        info!("Speech playback loop started");
        while self.registry.is_running() {
            self.registry.wait_for_work().await;
            if !self.registry.is_running() {
                break;
            }
            if let Err(e) = self.step().await {
                error!("error in speech loop: {}", e);
            }
        }
        if let Err(e) = self.finish_remaining() {
            error!("failed to end TTS sessions at shutdown: {}", e);
        }
        info!("Speech playback loop stopped");
    }

    /// Terminates every session that is no longer current. Shutdown clears
    /// the current session first, so nothing is left open afterwards.
    pub fn finish_remaining(&self) -> Result<()> {
        for session in self.registry.next_work().terminated {
            self.finish_session(&session)?;
        }
        Ok(())
    }

    /// Handles one wake: terminates stale sessions, then plays at most one
    /// chunk of the current session.
    pub async fn step(&self) -> Result<()> {
        let wake = self.registry.next_work();

        for session in wake.terminated {
            self.finish_session(&session)?;
        }

        let Some((session, chunk)) = wake.work else {
            return Ok(());
        };

        let session_id = session.id().to_string();
        self.events.emit(OutboundEvent::AudioOutputStart {
            session_id: session_id.clone(),
        })?;
        self.events.emit(OutboundEvent::ChunkStarted {
            session_id: session_id.clone(),
            chunk: chunk.clone(),
        })?;

        session.speech_finished().clear();
        self.play_chunk(&session, &chunk).await;

        self.events.emit(OutboundEvent::ChunkEnded {
            session_id,
            chunk: chunk.clone(),
        })?;

        if chunk.is_last() && session.try_finish() {
            self.finish_session(&session)?;
        }
        Ok(())
    }

    /// Plays one chunk and waits (bounded) for the hardware to finish. A
    /// missing or unplayable artifact is skipped, never fatal to the session.
    async fn play_chunk(&self, session: &Session, chunk: &SpeechChunk) {
        let path = match hal::local_path(&chunk.uri) {
            Ok(path) => path,
            Err(e) => {
                warn!(session_id = session.id(), "skipping TTS chunk: {}", e);
                return;
            }
        };
        if !path.is_file() {
            warn!(
                session_id = session.id(),
                "TTS chunk file missing, skipping: {}",
                path.display()
            );
            return;
        }

        let request = PlayRequest {
            media_id: Some(session.id()),
            correlation_id: Some(session.id()),
            ..PlayRequest::new(ForegroundChannel::Speech, &path)
        };
        let duration = match self.hal.play_foreground(request) {
            Ok(duration) => duration,
            Err(e) => {
                warn!(session_id = session.id(), "TTS chunk playback failed: {}", e);
                return;
            }
        };

        let Some(duration) = duration else {
            return;
        };
        info!(
            "Speaking TTS chunk {}/{} for {:.2} sec from session {}",
            chunk.chunk_index + 1,
            chunk.num_chunks,
            duration.as_secs_f64(),
            session.id()
        );

        let timeout = duration + self.grace;
        if !session.speech_finished().wait_timeout(timeout).await {
            debug!(
                session_id = session.id(),
                "no playback-ended signal within {:?}, moving on", timeout
            );
        }
    }

    /// Termination path. Callers must have won `Session::try_finish`.
    fn finish_session(&self, session: &Session) -> Result<()> {
        let session_id = session.id().to_string();
        self.events.emit(OutboundEvent::SessionEnded {
            session_id: session_id.clone(),
        })?;
        self.events
            .emit(OutboundEvent::AudioOutputEnd { session_id })?;
        info!("TTS session finished: {}", session.id());
        Ok(())
    }
}
