//! Slidecast Project Model
//!
//! Defines the core data contracts shared by the caption and assembly paths:
//! - **Transcript:** ASR tokens, the normalized script, and the per-character
//!   timeline that is the single source of truth for caption timing
//! - **Caption:** candidate lines and timed caption entries
//! - **Segment:** audio segment specs, frame specs, and render jobs
//! - **Project:** the on-disk material folder (slides, narration, avatar, script)
//! - **Artifacts:** timestamped debug dumps for post-hoc inspection
//!
//! All times are seconds as `f64` measured from the start of the narration.

pub mod artifacts;
pub mod caption;
pub mod project;
pub mod segment;
pub mod transcript;

pub use artifacts::*;
pub use caption::*;
pub use project::*;
pub use segment::*;
pub use transcript::*;
