//! Castweld Captions
//!
//! Local-first caption production:
//! - **Transcription:** whisper.cpp speech-to-text over the session audio
//! - **Subtitle Writers:** ASS (for burn-in) and SRT (sibling file) output
//!
//! The render pipeline consumes this crate through the [`Transcriber`]
//! trait, so renders degrade gracefully when no transcriber is installed.

pub mod subtitles;
pub mod transcription;

pub use subtitles::*;
pub use transcription::*;
