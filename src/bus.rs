//! Message envelope and topic names shared with the publish/subscribe bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub mod topic {
    // Inbound
    pub const RECORD_BEGIN: &str = "record_begin";
    pub const RECORD_END: &str = "record_end";
    pub const PLAY_SOUND: &str = "play_sound";
    pub const TTS_STOP: &str = "tts.stop";
    pub const TTS_SESSION_START: &str = "tts.session.start";
    pub const TTS_CHUNK_START: &str = "tts.chunk.start";
    pub const HAL_MEDIA_ENDED: &str = "hal.media.ended";
    pub const SERVICE_PLAY: &str = "service.play";
    pub const SERVICE_PAUSE: &str = "service.pause";
    pub const SERVICE_RESUME: &str = "service.resume";
    pub const SERVICE_STOP: &str = "service.stop";

    // Both directions: emitted by the speech loop, also observed as telemetry.
    pub const AUDIO_OUTPUT_START: &str = "audio_output_start";
    pub const AUDIO_OUTPUT_END: &str = "audio_output_end";

    // Outbound
    pub const TTS_CHUNK_STARTED: &str = "tts.chunk.started";
    pub const TTS_CHUNK_ENDED: &str = "tts.chunk.ended";
    pub const TTS_SESSION_ENDED: &str = "tts.session.ended";
    pub const SERVICE_PLAYING: &str = "service.playing";
    pub const SERVICE_PAUSED: &str = "service.paused";
    pub const SERVICE_RESUMED: &str = "service.resumed";
    pub const SERVICE_STOPPED: &str = "service.stopped";
    pub const SERVICE_POSITION: &str = "service.position";
    pub const QUEUE_END: &str = "queue_end";
}

/// One bus message: `{"type": ..., "data": {...}, "context": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default = "empty_object")]
    pub context: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Message {
    pub fn new(msg_type: &str, data: Value) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            data,
            context: empty_object(),
        }
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_data_and_context_default_to_empty_objects() {
        let message = Message::deserialize(r#"{"type": "record_begin"}"#).unwrap();
        assert_eq!(message.msg_type, topic::RECORD_BEGIN);
        assert_eq!(message.data, json!({}));
        assert_eq!(message.context, json!({}));
    }

    #[test]
    fn type_field_is_renamed_on_the_wire() {
        let raw = Message::new(topic::QUEUE_END, json!({"session_id": "x"}))
            .serialize()
            .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "queue_end");
        assert_eq!(value["data"]["session_id"], "x");
    }
}
