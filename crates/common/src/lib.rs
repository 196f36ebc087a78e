//! Slidecast Common Utilities
//!
//! Shared infrastructure for all Slidecast crates:
//! - Error taxonomy and result aliases
//! - Frame and sample clock math for frame-exact scheduling
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
