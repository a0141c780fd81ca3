//! Error type shared by every decoder in this crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::tag::Tag;

/// Result alias for decode operations.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Errors raised while decoding archives, banks and sequences.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A fixed-width read ran past the end of the source.
    #[error("truncated read: needed {needed} bytes at offset {offset:#x}, source is {len:#x} bytes")]
    TruncatedRead { offset: u64, needed: usize, len: u64 },

    /// A terminated read (string, varint) hit the end before its terminator.
    #[error("unexpected end of data at offset {offset:#x}")]
    UnexpectedEndOfData { offset: u64 },

    /// A read or seek left the bounds of a virtual region.
    #[error("offset {offset:#x} (+{len}) is outside region of {size:#x} bytes")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("invalid magic at {offset:#x}: expected {expected}, found {found}")]
    InvalidMagic { offset: u64, expected: Tag, found: Tag },

    #[error("unknown chunk {tag} at offset {offset:#x}")]
    UnknownChunk { offset: u64, tag: Tag },

    #[error("invalid instrument entry at {offset:#x}: {reason}")]
    InvalidInstrumentEntry { offset: u64, reason: String },

    #[error("{what} not found")]
    ChunkNotFound { what: String },

    /// Two tables that must agree in length do not.
    #[error("{what}: expected {expected} entries, found {found}")]
    TableMismatch { what: &'static str, expected: u32, found: u32 },

    #[error("{what} index {index} out of range (count {count})")]
    IndexOutOfRange { what: &'static str, index: u32, count: u32 },

    #[error("sample {id} not found")]
    SampleNotFound { id: u16 },

    /// A wave archive or staged PCM file referenced by the data is missing on disk.
    #[error("missing external resource: {}", path.display())]
    MissingExternalResource { path: PathBuf },

    /// A variable-length delay did not terminate within the allowed width.
    #[error("delay at offset {offset:#x} is longer than {max} bytes")]
    DelayTooLong { offset: u64, max: usize },

    #[error("opcode budget of {limit} exhausted at offset {offset:#x}")]
    UnboundedLoop { offset: u64, limit: usize },

    #[error("call stack deeper than {limit} at offset {offset:#x}")]
    StackOverflow { offset: u64, limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("record error: {0}")]
    Record(#[from] binrw::Error),
}

impl FormatError {
    /// Returns true for lookup misses that leave the resolver usable.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            FormatError::SampleNotFound { .. } | FormatError::IndexOutOfRange { .. }
        )
    }
}
