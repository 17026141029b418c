pub mod queue;
pub mod tts;

pub use queue::NarrationQueue;
pub use tts::TtsEngine;
