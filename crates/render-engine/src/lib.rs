//! Slidecast Render Engine
//!
//! Assembly path from frame-exact segment specs to the final video.
//!
//! ```text
//! images + located audio + frame schedule
//!              │
//!              ├── build_jobs (one RenderJob per segment)
//!              │
//!              ├── RenderCoordinator (bounded fan-out / fan-in)
//!              │        └── SegmentRenderer (ffmpeg, one call per segment)
//!              │
//!              ├── concat_segments (stream copy, index order)
//!              │
//!              └── composite_final (avatar inset + burned subtitles)
//!                       │
//!                       ▼
//!                   final.mp4
//! ```

pub mod coordinator;
pub mod ffmpeg;
pub mod plan;

pub use coordinator::*;
pub use ffmpeg::*;
pub use plan::*;
