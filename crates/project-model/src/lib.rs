//! Castweld Session Model
//!
//! Defines the core data contracts for recorded sessions:
//! - **Samples:** the sparse pointer track read from `cursor.json`
//! - **Settings:** immutable per-render configuration
//! - **Session:** the fixed directory layout and its validation
//!
//! Pointer coordinates are normalized to `[0.0, 1.0]` relative to the
//! display frame to survive resolution changes across machines.

pub mod project;
pub mod sample;
pub mod settings;

pub use project::*;
pub use sample::*;
pub use settings::*;
