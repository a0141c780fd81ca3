//! Headless controller for JAudio sound archives.
//!
//! Provides a unified API for loading archives, resolving notes to
//! samples, walking sequences, and the offline split/extract tools that
//! the CLI shares.

mod controller;
mod extract;

// Re-export common types so callers don't need ja-formats/ja-engine directly.
pub use ja_engine::{PlayerCommand, PlayerConfig};
pub use ja_formats::{Archive, DecodeLimits, FormatError, Result, WaveDirectory};
pub use ja_ir::{Instrument, Sample, Sequence};

pub use controller::{Controller, NoteInfo, PreloadSummary, RenderedCommand, ResolvedNote};
pub use extract::{extract_waves, split_archive, split_file_name, SplitFile};
