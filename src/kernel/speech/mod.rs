pub mod chunk;
pub mod player;
pub mod signal;

pub use chunk::SpeechChunk;
pub use player::SpeechPlayer;
pub use signal::FinishedSignal;
