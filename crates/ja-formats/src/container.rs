//! Top-level `AA_<` sound archive.
//!
//! The archive header is a flat list of tagged entries closed by `>_AA`.
//! Entries point at blobs elsewhere in the file in one of two ways:
//!
//! * explicit range: `(start, end)`
//! * indirect length: leading fields plus `start`; the blob's size is the
//!   u32 at `start + 4` and the blob is `[start, start + size)`
//!
//! After an entry the cursor continues right after its field list, never
//! after the blob.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cursor::{ByteCursor, ByteSource, FileSource, VirtualRegion};
use crate::error::{FormatError, Result};
use crate::instrument_bank::InstrumentBank;
use crate::sample_bank::SampleBank;
use crate::tag::Tag;

pub const ARCHIVE_MAGIC: Tag = Tag::new(b"AA_<");
pub const ARCHIVE_END: Tag = Tag::new(b">_AA");
pub const BST: Tag = Tag::new(b"bst ");
pub const BSTN: Tag = Tag::new(b"bstn");
pub const BSC: Tag = Tag::new(b"bsc ");
pub const WS: Tag = Tag::new(b"ws  ");
pub const BNK: Tag = Tag::new(b"bnk ");
pub const BFCA: Tag = Tag::new(b"bfca");

/// Offset of the bank id inside an IBNK blob.
const BANK_ID_OFFSET: u64 = 8;

/// What an archive entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    /// `bst ` sound table
    SoundTable,
    /// `bstn` sound table names
    SoundTableNames,
    /// `bsc ` sequence collection
    SequenceCollection,
    /// `ws  ` wave system
    WaveSystem { id: u32 },
    /// `bnk ` instrument bank, with its own id and the wave system it uses
    InstrumentBank { id: u32, wave_system: u32 },
    /// `bfca` RARC-like archive of sequences
    Rarc,
}

/// One resolved archive entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkEntry {
    pub tag: Tag,
    pub kind: ChunkKind,
    /// Offset of the entry's tag in the header
    pub entry_offset: u64,
    /// Absolute blob start
    pub start: u64,
    /// Absolute blob end (exclusive)
    pub end: u64,
}

impl ChunkEntry {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Walk the archive header and resolve every entry's blob range.
pub fn read_chunks<S: ByteSource>(source: &S) -> Result<Vec<ChunkEntry>> {
    let mut c = ByteCursor::new(source);
    c.expect_tag(ARCHIVE_MAGIC)?;
    let mut chunks = Vec::new();
    loop {
        let entry_offset = c.tell();
        let tag = c.read_tag()?;
        let (kind, start, end) = match tag {
            t if t == ARCHIVE_END => break,
            t if t == BST || t == BSTN || t == BSC => {
                let start = c.read_u32()? as u64;
                let end = c.read_u32()? as u64;
                if end < start || end > c.len() {
                    return Err(FormatError::OutOfBounds {
                        offset: start,
                        len: end.saturating_sub(start),
                        size: c.len(),
                    });
                }
                let kind = if t == BST {
                    ChunkKind::SoundTable
                } else if t == BSTN {
                    ChunkKind::SoundTableNames
                } else {
                    ChunkKind::SequenceCollection
                };
                (kind, start, end)
            }
            t if t == WS => {
                let id = c.read_u32()?;
                let start = c.read_u32()? as u64;
                c.skip(4)?;
                let end = indirect_end(&mut c, start)?;
                (ChunkKind::WaveSystem { id }, start, end)
            }
            t if t == BNK => {
                let wave_system = c.read_u32()?;
                let start = c.read_u32()? as u64;
                let end = indirect_end(&mut c, start)?;
                let id = c.at(start + BANK_ID_OFFSET, |c| c.read_u32())?;
                (ChunkKind::InstrumentBank { id, wave_system }, start, end)
            }
            t if t == BFCA => {
                let start = c.read_u32()? as u64;
                let end = indirect_end(&mut c, start)?;
                (ChunkKind::Rarc, start, end)
            }
            other => {
                return Err(FormatError::UnknownChunk {
                    offset: entry_offset,
                    tag: other,
                })
            }
        };
        debug!(%tag, ?kind, start, end, "archive chunk");
        chunks.push(ChunkEntry {
            tag,
            kind,
            entry_offset,
            start,
            end,
        });
    }
    Ok(chunks)
}

/// End of an indirectly sized blob; the cursor position is preserved.
fn indirect_end<S: ByteSource>(c: &mut ByteCursor<S>, start: u64) -> Result<u64> {
    let size = c.at(start + 4, |c| c.read_u32())? as u64;
    let end = start + size;
    if end > c.len() {
        return Err(FormatError::OutOfBounds {
            offset: start,
            len: size,
            size: c.len(),
        });
    }
    Ok(end)
}

/// A decoded sound archive with its wave systems and instrument banks.
///
/// Banks read their blobs through [`VirtualRegion`]s over a shared source,
/// so `S` is usually an `Arc`.
#[derive(Debug)]
pub struct Archive<S> {
    source: S,
    chunks: Vec<ChunkEntry>,
    wave_systems: BTreeMap<u32, SampleBank<VirtualRegion<S>>>,
    instrument_banks: BTreeMap<u32, InstrumentBank<VirtualRegion<S>>>,
}

impl Archive<Arc<FileSource>> {
    /// Open an archive file.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Archive::open(Arc::new(FileSource::open(path)?))
    }
}

impl Archive<Arc<Vec<u8>>> {
    /// Open an archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Archive::open(Arc::new(data))
    }
}

impl<S: ByteSource + Clone> Archive<S> {
    /// Read the header and build every wave system and instrument bank.
    pub fn open(source: S) -> Result<Self> {
        let chunks = read_chunks(&source)?;
        let mut wave_systems = BTreeMap::new();
        let mut instrument_banks = BTreeMap::new();
        for chunk in &chunks {
            match chunk.kind {
                ChunkKind::WaveSystem { id } => {
                    if wave_systems.contains_key(&id) {
                        warn!(id, "duplicate wave system ignored");
                        continue;
                    }
                    let region = VirtualRegion::new(source.clone(), chunk.start, chunk.len())?;
                    wave_systems.insert(id, SampleBank::new(region)?);
                }
                ChunkKind::InstrumentBank { id, wave_system } => {
                    if instrument_banks.contains_key(&id) {
                        warn!(id, "duplicate instrument bank ignored");
                        continue;
                    }
                    let region = VirtualRegion::new(source.clone(), chunk.start, chunk.len())?;
                    instrument_banks.insert(id, InstrumentBank::new(region, wave_system)?);
                }
                _ => {}
            }
        }
        debug!(
            chunks = chunks.len(),
            wave_systems = wave_systems.len(),
            banks = instrument_banks.len(),
            "archive"
        );
        Ok(Self {
            source,
            chunks,
            wave_systems,
            instrument_banks,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    /// View of one chunk's blob.
    pub fn blob(&self, chunk: &ChunkEntry) -> Result<VirtualRegion<S>> {
        VirtualRegion::new(self.source.clone(), chunk.start, chunk.len())
    }

    pub fn wave_system(&self, id: u32) -> Option<&SampleBank<VirtualRegion<S>>> {
        self.wave_systems.get(&id)
    }

    pub fn instrument_bank(&self, id: u32) -> Option<&InstrumentBank<VirtualRegion<S>>> {
        self.instrument_banks.get(&id)
    }

    /// Wave systems by id, ascending.
    pub fn wave_systems(&self) -> impl Iterator<Item = (u32, &SampleBank<VirtualRegion<S>>)> {
        self.wave_systems.iter().map(|(id, bank)| (*id, bank))
    }

    /// Instrument banks by id, ascending.
    pub fn instrument_banks(&self) -> impl Iterator<Item = (u32, &InstrumentBank<VirtualRegion<S>>)> {
        self.instrument_banks.iter().map(|(id, bank)| (*id, bank))
    }
}
