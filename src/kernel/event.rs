use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::{topic, Message};
use crate::error::{AudioError, Result};
use crate::hal::ForegroundChannel;
use crate::kernel::speech::chunk::SpeechChunk;

pub type SessionId = String;

/// Background playlist entry: a bare URI or a `[uri, mimetype]` pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Track {
    Uri(String),
    Typed(String, String),
}

impl Track {
    pub fn uri(&self) -> &str {
        match self {
            Track::Uri(uri) | Track::Typed(uri, _) => uri,
        }
    }
}

/// Events consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Listening started.
    RecordBegin,
    RecordEnd,
    /// Speech output telemetry, used only for ducking.
    AudioOutputStart,
    AudioOutputEnd,
    PlaySound {
        uri: String,
        volume: Option<f32>,
        session_id: Option<SessionId>,
    },
    TtsStop,
    TtsSessionStart {
        session_id: SessionId,
    },
    TtsChunk {
        session_id: SessionId,
        chunk: SpeechChunk,
    },
    MediaEnded {
        channel: Option<ForegroundChannel>,
        background: bool,
        media_id: Option<String>,
    },
    StreamPlay {
        session_id: Option<SessionId>,
        tracks: Vec<Track>,
    },
    StreamPause {
        session_id: Option<SessionId>,
    },
    StreamResume {
        session_id: Option<SessionId>,
    },
    StreamStop {
        session_id: Option<SessionId>,
    },
}

#[derive(Deserialize)]
struct PlaySoundPayload {
    uri: String,
    #[serde(default)]
    volume: Option<f32>,
    #[serde(default, alias = "mycroft_session_id")]
    session_id: Option<SessionId>,
}

#[derive(Deserialize)]
struct SessionStartPayload {
    #[serde(alias = "mycroft_session_id")]
    session_id: SessionId,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default, alias = "mycroft_session_id")]
    session_id: SessionId,
    #[serde(flatten)]
    chunk: SpeechChunk,
}

#[derive(Deserialize)]
struct MediaEndedPayload {
    #[serde(default)]
    channel: Option<ForegroundChannel>,
    #[serde(default)]
    background: bool,
    #[serde(default)]
    media_id: Option<String>,
}

#[derive(Deserialize)]
struct StreamPlayPayload {
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default, alias = "mycroft_session_id")]
    session_id: Option<SessionId>,
}

#[derive(Deserialize)]
struct StreamControlPayload {
    #[serde(default, alias = "mycroft_session_id")]
    session_id: Option<SessionId>,
}

fn payload<T: serde::de::DeserializeOwned>(message: &Message) -> Result<T> {
    serde_json::from_value(message.data.clone()).map_err(|source| AudioError::Payload {
        topic: message.msg_type.clone(),
        source,
    })
}

impl TryFrom<&Message> for InboundEvent {
    type Error = AudioError;

    fn try_from(message: &Message) -> Result<Self> {
        let event = match message.msg_type.as_str() {
            topic::RECORD_BEGIN => InboundEvent::RecordBegin,
            topic::RECORD_END => InboundEvent::RecordEnd,
            topic::AUDIO_OUTPUT_START => InboundEvent::AudioOutputStart,
            topic::AUDIO_OUTPUT_END => InboundEvent::AudioOutputEnd,
            topic::PLAY_SOUND => {
                let p: PlaySoundPayload = payload(message)?;
                InboundEvent::PlaySound {
                    uri: p.uri,
                    volume: p.volume,
                    session_id: p.session_id,
                }
            }
            topic::TTS_STOP => InboundEvent::TtsStop,
            topic::TTS_SESSION_START => {
                let p: SessionStartPayload = payload(message)?;
                InboundEvent::TtsSessionStart {
                    session_id: p.session_id,
                }
            }
            topic::TTS_CHUNK_START => {
                let p: ChunkPayload = payload(message)?;
                InboundEvent::TtsChunk {
                    session_id: p.session_id,
                    chunk: p.chunk,
                }
            }
            topic::HAL_MEDIA_ENDED => {
                let p: MediaEndedPayload = payload(message)?;
                InboundEvent::MediaEnded {
                    channel: p.channel,
                    background: p.background,
                    media_id: p.media_id,
                }
            }
            topic::SERVICE_PLAY => {
                let p: StreamPlayPayload = payload(message)?;
                InboundEvent::StreamPlay {
                    session_id: p.session_id,
                    tracks: p.tracks,
                }
            }
            topic::SERVICE_PAUSE => InboundEvent::StreamPause {
                session_id: payload::<StreamControlPayload>(message)?.session_id,
            },
            topic::SERVICE_RESUME => InboundEvent::StreamResume {
                session_id: payload::<StreamControlPayload>(message)?.session_id,
            },
            topic::SERVICE_STOP => InboundEvent::StreamStop {
                session_id: payload::<StreamControlPayload>(message)?.session_id,
            },
            other => return Err(AudioError::UnknownTopic(other.to_string())),
        };
        Ok(event)
    }
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    AudioOutputStart {
        session_id: SessionId,
    },
    AudioOutputEnd {
        session_id: SessionId,
    },
    ChunkStarted {
        session_id: SessionId,
        chunk: SpeechChunk,
    },
    ChunkEnded {
        session_id: SessionId,
        chunk: SpeechChunk,
    },
    SessionEnded {
        session_id: SessionId,
    },
    StreamPlaying {
        session_id: Option<SessionId>,
    },
    StreamPaused {
        session_id: Option<SessionId>,
    },
    StreamResumed {
        session_id: Option<SessionId>,
    },
    StreamStopped {
        session_id: Option<SessionId>,
    },
    StreamPosition {
        session_id: Option<SessionId>,
        position_ms: i64,
    },
    QueueEnd {
        session_id: Option<SessionId>,
    },
}

impl OutboundEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            OutboundEvent::AudioOutputStart { .. } => topic::AUDIO_OUTPUT_START,
            OutboundEvent::AudioOutputEnd { .. } => topic::AUDIO_OUTPUT_END,
            OutboundEvent::ChunkStarted { .. } => topic::TTS_CHUNK_STARTED,
            OutboundEvent::ChunkEnded { .. } => topic::TTS_CHUNK_ENDED,
            OutboundEvent::SessionEnded { .. } => topic::TTS_SESSION_ENDED,
            OutboundEvent::StreamPlaying { .. } => topic::SERVICE_PLAYING,
            OutboundEvent::StreamPaused { .. } => topic::SERVICE_PAUSED,
            OutboundEvent::StreamResumed { .. } => topic::SERVICE_RESUMED,
            OutboundEvent::StreamStopped { .. } => topic::SERVICE_STOPPED,
            OutboundEvent::StreamPosition { .. } => topic::SERVICE_POSITION,
            OutboundEvent::QueueEnd { .. } => topic::QUEUE_END,
        }
    }

    pub fn into_message(self) -> Message {
        let topic = self.topic();
        let data = match self {
            OutboundEvent::AudioOutputStart { session_id }
            | OutboundEvent::AudioOutputEnd { session_id }
            | OutboundEvent::SessionEnded { session_id } => json!({ "session_id": session_id }),
            OutboundEvent::ChunkStarted { session_id, chunk }
            | OutboundEvent::ChunkEnded { session_id, chunk } => json!({
                "session_id": session_id,
                "chunk_index": chunk.chunk_index,
                "num_chunks": chunk.num_chunks,
                "uri": chunk.uri,
                "text": chunk.text,
            }),
            OutboundEvent::StreamPlaying { session_id }
            | OutboundEvent::StreamPaused { session_id }
            | OutboundEvent::StreamResumed { session_id }
            | OutboundEvent::StreamStopped { session_id }
            | OutboundEvent::QueueEnd { session_id } => json!({ "session_id": session_id }),
            OutboundEvent::StreamPosition {
                session_id,
                position_ms,
            } => json!({ "session_id": session_id, "position_ms": position_ms }),
        };
        Message::new(topic, data)
    }
}

/// Outbound side of the bus, shared by every component that emits.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: OutboundEvent) -> Result<()> {
        debug!(topic = event.topic(), "emit");
        self.tx.send(event).map_err(|_| AudioError::BusClosed)
    }
}
