use serde::{Deserialize, Serialize};

/// One already-synthesized piece of an utterance.
///
/// A sentence is typically split into several chunks for faster time to
/// first audio; chunks of one utterance share a session id and are played
/// exactly once, in push order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechChunk {
    pub uri: String,
    #[serde(default)]
    pub chunk_index: i64,
    #[serde(default = "single_chunk")]
    pub num_chunks: i64,
    /// Diagnostics only.
    #[serde(default)]
    pub text: Option<String>,
}

fn single_chunk() -> i64 {
    1
}

impl SpeechChunk {
    pub fn new(uri: impl Into<String>, chunk_index: i64, num_chunks: i64) -> Self {
        Self {
            uri: uri.into(),
            chunk_index,
            num_chunks,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_first(&self) -> bool {
        self.chunk_index <= 0
    }

    pub fn is_last(&self) -> bool {
        self.chunk_index >= self.num_chunks.saturating_sub(1)
    }
}
