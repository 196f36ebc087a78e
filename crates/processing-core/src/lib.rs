//! Slidecast Processing Core
//!
//! Turns independently produced streams into trustworthy timing:
//! - **Normalizer:** Tag script characters as semantic or skippable
//! - **Force Alignment:** Reconcile ASR tokens with the script per character
//! - **Line Matching:** Time externally segmented caption lines
//! - **Frame Scheduling:** Frame-exact segment boundaries that sum exactly
//!
//! This crate is pure computation with no I/O.
//! All inputs are data; all outputs are data.

pub mod force_align;
pub mod frame_schedule;
pub mod line_match;
pub mod normalizer;

pub use force_align::ForceAligner;
pub use frame_schedule::{boundary_drift, FrameScheduler};
pub use line_match::{LineMatcher, MatchOutcome};
pub use normalizer::{normalize, SkipSet};
