//! Decoders for JAudio sound data.
//!
//! Reads `AA_<` sound archives, IBNK instrument banks, WSYS wave systems,
//! AFC ADPCM payloads and BMS sequences into the `ja-ir` data model.

pub mod adpcm;
mod container;
mod cursor;
mod error;
pub mod fixture;
mod instrument_bank;
mod sample_bank;
pub mod sequence;
mod staging;
mod tag;
mod writer;

pub use adpcm::{decode_frame, decoded_len, AdpcmDecoder, AdpcmHistory};
pub use container::{read_chunks, Archive, ChunkEntry, ChunkKind};
pub use cursor::{ByteCursor, ByteSource, FileSource, Record, VirtualRegion};
pub use error::{FormatError, Result};
pub use instrument_bank::InstrumentBank;
pub use sample_bank::{SampleBank, WaveArchive};
pub use sequence::{Bms, DecodeLimits};
pub use staging::{
    read_wav, staged_file_name, write_wav_mono16, MemoryStage, PcmStage, StagedPcm, WaveDirectory,
};
pub use tag::Tag;
pub use writer::ByteWriter;

/// Tag constants for every chunk kind this crate understands.
pub mod tags {
    pub use crate::container::{ARCHIVE_END, ARCHIVE_MAGIC, BFCA, BNK, BSC, BST, BSTN, WS};
    pub use crate::instrument_bank::{IBNK, INST, LIST, PERC, PMAP};
    pub use crate::sample_bank::{CDF, SCNE, WBCT, WINF, WSYS};
}
