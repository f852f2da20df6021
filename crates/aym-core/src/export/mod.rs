//! Audio export
//!
//! Feature-gated receivers writing rendered samples to files.

pub mod wav;

pub use wav::WavReceiver;
