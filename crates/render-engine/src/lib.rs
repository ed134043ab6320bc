//! Castweld Render Engine
//!
//! Offline rendering pipeline that composites a recorded session
//! (screen, webcam, pointer track, audio) into a final video file
//! by way of a generated filter graph.
//!
//! # Pipeline Architecture
//!
//! ```text
//! display.mp4 ──┐
//!               ├── Camera Scale/Mask/Shadow
//! camera.mp4 ───┘         │
//!                         ├── Cursor Overlay (compiled expressions)
//! cursor.json ────────────┘         │
//!                                   ├── Caption Burn
//! audio-input.ogg ──────────────────┘         │
//!                                             ▼
//!                                     Encode (NVENC or software)
//!                                             │
//!                                             ▼
//!                                         output.mp4
//! ```

pub mod encoder;
pub mod engine;
pub mod expr;
pub mod filter;
pub mod render;

pub use encoder::{select_encoder, CapabilitySnapshot, EncoderConfig, EncoderKind};
pub use engine::{EngineProgress, EngineRun, FfmpegEngine, MediaEngine};
pub use expr::PiecewiseExpr;
pub use filter::FilterGraph;
pub use render::{
    render_session, run_render, ProgressCallback, RenderJob, RenderOutcome, RenderProgress,
    RenderStage,
};
