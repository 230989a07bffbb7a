//! Event router: maps inbound bus events onto the registry, the arbiter and
//! the background stream. Handlers only mutate state and signal; they never
//! wait on playback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::Message;
use crate::error::Result;
use crate::hal::{AudioHal, ForegroundChannel};
use crate::kernel::arbiter::ForegroundArbiter;
use crate::kernel::event::InboundEvent;
use crate::kernel::speech::chunk::SpeechChunk;
use crate::kernel::state::{Enqueue, SessionRegistry, SessionStart};
use crate::kernel::stream::BackgroundStream;

pub struct Reactor {
    pub registry: Arc<SessionRegistry>,
    pub arbiter: Arc<ForegroundArbiter>,
    pub stream: Arc<BackgroundStream>,
    hal: Arc<dyn AudioHal>,
}

impl Reactor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        arbiter: Arc<ForegroundArbiter>,
        stream: Arc<BackgroundStream>,
        hal: Arc<dyn AudioHal>,
    ) -> Self {
        Self {
            registry,
            arbiter,
            stream,
            hal,
        }
    }

    pub fn handle(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::RecordBegin => {
                // Listening takes priority over our own voice.
                self.arbiter.duck();
                self.stop_speech();
                self.arbiter.confirm_listening()
            }
            InboundEvent::RecordEnd => {
                self.arbiter.unduck();
                Ok(())
            }
            InboundEvent::AudioOutputStart => {
                self.arbiter.duck();
                Ok(())
            }
            InboundEvent::AudioOutputEnd => {
                self.arbiter.unduck();
                Ok(())
            }
            InboundEvent::PlaySound {
                uri,
                volume,
                session_id,
            } => self
                .arbiter
                .play_effect(&uri, volume, session_id.as_deref()),
            InboundEvent::TtsStop => {
                self.stop_speech();
                Ok(())
            }
            InboundEvent::TtsSessionStart { session_id } => {
                self.start_session(&session_id);
                Ok(())
            }
            InboundEvent::TtsChunk { session_id, chunk } => {
                self.enqueue_chunk(&session_id, chunk);
                Ok(())
            }
            InboundEvent::MediaEnded {
                channel,
                background,
                media_id,
            } => self.media_ended(channel, background, media_id.as_deref()),
            InboundEvent::StreamPlay { session_id, tracks } => {
                self.stream.play(session_id, &tracks)
            }
            InboundEvent::StreamPause { session_id } => self.stream.pause(session_id).map(|_| ()),
            InboundEvent::StreamResume { session_id } => {
                self.stream.resume(session_id).map(|_| ())
            }
            InboundEvent::StreamStop { session_id } => self.stream.stop(session_id).map(|_| ()),
        }
    }

    /// Decodes and handles one bus message. Failures are logged, never fatal.
    pub fn handle_message(&self, message: &Message) {
        let result = InboundEvent::try_from(message).and_then(|event| self.handle(event));
        if let Err(e) = result {
            warn!("failed to handle {}: {}", message.msg_type, e);
        }
    }

    /// Drains inbound messages until the sender side closes.
    pub async fn run(&self, mut inbound: mpsc::UnboundedReceiver<Message>) {
        info!("Event router started");
        while let Some(message) = inbound.recv().await {
            self.handle_message(&message);
        }
        info!("Event router stopped: inbound bus closed");
    }

    fn start_session(&self, session_id: &str) {
        if self.registry.start_session(session_id) == SessionStart::Superseded {
            // Whatever was mid-utterance belongs to another session now.
            self.hal.stop_foreground(ForegroundChannel::Speech);
        }
    }

    fn enqueue_chunk(&self, session_id: &str, chunk: SpeechChunk) {
        let (index, count) = (chunk.chunk_index, chunk.num_chunks);
        let text = chunk.text.clone().unwrap_or_default();
        let uri = chunk.uri.clone();

        match self.registry.enqueue(session_id, chunk) {
            Enqueue::Accepted => info!(
                "Queued TTS chunk {}/{}: {} (session={}): {}",
                index + 1,
                count,
                uri,
                session_id,
                text
            ),
            Enqueue::NotCurrent => debug!(
                "Dropping TTS chunk from cancelled session {}: {}",
                session_id, text
            ),
        }
    }

    fn stop_speech(&self) {
        self.registry.clear_current();
        self.hal.stop_foreground(ForegroundChannel::Speech);
    }

    fn media_ended(
        &self,
        channel: Option<ForegroundChannel>,
        background: bool,
        media_id: Option<&str>,
    ) -> Result<()> {
        if channel == Some(ForegroundChannel::Speech) {
            if let Some(id) = media_id {
                if self.registry.signal_finished(id) {
                    debug!("TTS chunk finished playing for session {}", id);
                }
            }
            Ok(())
        } else if background {
            self.stream.media_ended()
        } else {
            Ok(())
        }
    }
}

