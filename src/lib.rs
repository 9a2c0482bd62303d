#![deny(clippy::all)]
#![deny(clippy::pedantic)]
pub mod backends;
pub mod blocks;
pub mod config;
pub mod conversion;
pub mod detector;
pub mod driver;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod speech;
pub mod symbols;
pub mod task_manager;
pub mod voice;
pub mod voice_manager;
pub use driver::{SynthDriver, SynthEvent};
pub use error::SpeechError;
pub use speech::{SpeechCommand, SpeechSequence};
