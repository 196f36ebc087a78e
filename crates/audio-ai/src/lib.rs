//! Slidecast Audio Intelligence
//!
//! Everything that touches narration audio or caption text:
//! - **Oracles:** ASR and line-segmentation capability traits plus
//!   deterministic replay/local implementations
//! - **Offset Locator:** FFT cross-correlation of clips against the full track
//! - **WAV I/O:** mono PCM loading for the locator
//! - **Captions:** the normalize → align → segment → match pipeline
//! - **Subtitle Generation:** SRT/VTT/ASS output from caption entries

pub mod captions;
pub mod locator;
pub mod oracle;
pub mod subtitles;
pub mod wav;

pub use captions::*;
pub use locator::*;
pub use oracle::*;
pub use subtitles::*;
pub use wav::*;
