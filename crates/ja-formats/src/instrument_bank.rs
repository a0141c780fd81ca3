//! IBNK instrument bank resolver.
//!
//! A bank is a tagged chunk stream starting at 0x20. Only the `LIST` chunk
//! is used: it holds a count followed by absolute pointers to instrument
//! entries. Each entry is either a melodic `Inst` (key-ranged sample table)
//! or a percussion `Perc` (one optional `Pmap` per key slot).
//!
//! All offsets are relative to the start of the bank blob, so a bank inside
//! an archive is read through a [`VirtualRegion`](crate::VirtualRegion).

use binrw::BinRead;
use ja_ir::{Instrument, SampleEntry, MAX_KEY};
use tracing::debug;

use crate::cursor::{ByteCursor, ByteSource, Record};
use crate::error::{FormatError, Result};
use crate::tag::Tag;

pub const IBNK: Tag = Tag::new(b"IBNK");
pub const LIST: Tag = Tag::new(b"LIST");
pub const INST: Tag = Tag::new(b"Inst");
pub const PERC: Tag = Tag::new(b"Perc");
pub const PMAP: Tag = Tag::new(b"Pmap");

/// First chunk header after the bank header.
const CHUNK_BASE: u64 = 0x20;
/// Offset of the bank's own id inside the header.
const BANK_ID_OFFSET: u64 = 0x08;
/// Percussion instruments map at most one entry per key.
const MAX_PERCUSSION_SLOTS: u32 = MAX_KEY as u32 + 1;

#[derive(BinRead, Debug)]
#[br(big)]
struct MelodicRecord {
    key_limit: u8,
    #[br(pad_before = 11)]
    sample_id: u32,
    #[br(pad_before = 4)]
    frequency_multiplier: f32,
}

impl Record for MelodicRecord {
    const SIZE: usize = 24;
}

/// `Pmap` body, read after its tag.
#[derive(BinRead, Debug)]
#[br(big)]
struct PercussionRecord {
    #[br(pad_before = 4)]
    frequency_multiplier: f32,
    pan: u8,
    #[br(pad_before = 15)]
    sample_id: u32,
}

impl Record for PercussionRecord {
    const SIZE: usize = 28;
}

/// Byte offset of the sample id inside a melodic record.
const MELODIC_ID_OFFSET: u64 = 12;
/// Byte offset of the sample id inside a `Pmap` entry, tag included.
const PMAP_ID_OFFSET: u64 = 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    Melodic,
    Percussion,
}

/// Resolves instrument indices to instrument definitions.
#[derive(Debug)]
pub struct InstrumentBank<S> {
    source: S,
    id: u32,
    wave_system: u32,
    list_offset: u64,
}

impl<S: ByteSource> InstrumentBank<S> {
    /// Validate the bank header and locate its instrument list.
    ///
    /// `wave_system` is the id of the wave system this bank's sample ids
    /// refer to; the container records it next to the bank.
    pub fn new(source: S, wave_system: u32) -> Result<Self> {
        let mut c = ByteCursor::new(&source);
        c.expect_tag(IBNK)?;
        c.seek(BANK_ID_OFFSET)?;
        let id = c.read_u32()?;
        let list_offset = find_chunk(&mut c, LIST)?;
        debug!(id, wave_system, list_offset, "instrument bank");
        Ok(Self {
            source,
            id,
            wave_system,
            list_offset,
        })
    }

    /// The bank's own id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Id of the wave system holding this bank's samples.
    pub fn wave_system(&self) -> u32 {
        self.wave_system
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn instrument_count(&self) -> Result<u32> {
        let mut c = ByteCursor::new(&self.source);
        c.seek(self.list_offset)?;
        c.read_u32()
    }

    /// Resolve instrument `index` with all of its sample entries.
    pub fn instrument(&self, index: u32) -> Result<Instrument> {
        let mut c = ByteCursor::new(&self.source);
        match self.open_entry(&mut c, index)? {
            EntryKind::Melodic => read_melodic(&mut c),
            EntryKind::Percussion => read_percussion(&mut c),
        }
    }

    /// Sample ids used by instrument `index`, without reading full entries.
    pub fn samples_used_by(&self, index: u32) -> Result<Vec<u16>> {
        let mut c = ByteCursor::new(&self.source);
        let mut ids = Vec::new();
        match self.open_entry(&mut c, index)? {
            EntryKind::Melodic => {
                let (table, count) = melodic_table(&mut c)?;
                for i in 0..count as u64 {
                    c.seek(table + i * MelodicRecord::SIZE as u64 + MELODIC_ID_OFFSET)?;
                    ids.push(c.read_u32()? as u16);
                }
            }
            EntryKind::Percussion => {
                for (_, entry) in percussion_slots(&mut c)? {
                    c.seek(entry + PMAP_ID_OFFSET)?;
                    ids.push(c.read_u32()? as u16);
                }
            }
        }
        Ok(ids)
    }

    /// Seek to instrument `index` and consume its sub-tag.
    fn open_entry<T: ByteSource>(&self, c: &mut ByteCursor<T>, index: u32) -> Result<EntryKind> {
        c.seek(self.list_offset)?;
        let count = c.read_u32()?;
        if index >= count {
            return Err(FormatError::IndexOutOfRange {
                what: "instrument",
                index,
                count,
            });
        }
        c.seek(self.list_offset + 4 + 4 * index as u64)?;
        let entry = c.read_u32()? as u64;
        c.seek(entry)?;
        let tag = c.read_tag()?;
        match tag {
            t if t == INST => Ok(EntryKind::Melodic),
            t if t == PERC => Ok(EntryKind::Percussion),
            other => Err(FormatError::InvalidInstrumentEntry {
                offset: entry,
                reason: format!("expected {} or {}, found {}", INST, PERC, other),
            }),
        }
    }
}

/// Scan chunk headers from 0x20 for `tag`; returns the offset of its body.
fn find_chunk<S: ByteSource>(c: &mut ByteCursor<S>, tag: Tag) -> Result<u64> {
    let len = c.len();
    let mut pos = CHUNK_BASE;
    while pos + 8 <= len {
        c.seek(pos)?;
        if c.read_tag()? == tag {
            return Ok(pos + 8);
        }
        let size = (c.read_u32()? as u64 + 3) & !3;
        pos += size + 8;
    }
    Err(FormatError::ChunkNotFound {
        what: format!("chunk {}", tag),
    })
}

/// Position and length of a melodic record table. The cursor must sit just
/// past the `Inst` tag.
fn melodic_table<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<(u64, u32)> {
    c.skip(12)?;
    let mut count = c.read_u32()?;
    if count == 0 {
        // Some banks pad the count with four zero bytes.
        count = c.read_u32()?;
    }
    Ok((c.tell(), count))
}

fn read_melodic<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<Instrument> {
    let (table, count) = melodic_table(c)?;
    let size = MelodicRecord::SIZE as u64;
    let mut entries = Vec::new();
    for i in 0..count as u64 {
        let at = table + i * size;
        c.seek(at)?;
        let rec: MelodicRecord = c.read_record()?;
        if rec.key_limit > MAX_KEY {
            return Err(FormatError::InvalidInstrumentEntry {
                offset: at,
                reason: format!("key limit {} above {}", rec.key_limit, MAX_KEY),
            });
        }
        entries.push(SampleEntry {
            key_limit: rec.key_limit,
            sample_id: rec.sample_id as u16,
            frequency_multiplier: rec.frequency_multiplier,
            pan: None,
        });
    }
    c.seek(table + count as u64 * size + 4)?;
    let mut inst = Instrument::melodic(c.read_f32()?);
    inst.entries = entries;
    Ok(inst)
}

/// Non-empty percussion slots as `(key, entry offset)`. The cursor must sit
/// just past the `Perc` tag. Every entry's `Pmap` tag is checked.
fn percussion_slots<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<Vec<(u8, u64)>> {
    let count_at = c.tell();
    let count = c.read_u32()?;
    if count > MAX_PERCUSSION_SLOTS {
        return Err(FormatError::InvalidInstrumentEntry {
            offset: count_at,
            reason: format!("{} percussion slots", count),
        });
    }
    let table = c.tell();
    let mut slots = Vec::new();
    for key in 0..count {
        c.seek(table + 4 * key as u64)?;
        let entry = c.read_u32()? as u64;
        if entry == 0 {
            continue;
        }
        c.seek(entry)?;
        let tag = c.read_tag()?;
        if tag != PMAP {
            return Err(FormatError::InvalidInstrumentEntry {
                offset: entry,
                reason: format!("expected {}, found {}", PMAP, tag),
            });
        }
        slots.push((key as u8, entry));
    }
    Ok(slots)
}

fn read_percussion<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<Instrument> {
    let mut inst = Instrument::percussion();
    for (key, entry) in percussion_slots(c)? {
        c.seek(entry + 4)?;
        let rec: PercussionRecord = c.read_record()?;
        if rec.pan > MAX_KEY {
            return Err(FormatError::InvalidInstrumentEntry {
                offset: entry,
                reason: format!("pan {} above {}", rec.pan, MAX_KEY),
            });
        }
        inst.entries.push(SampleEntry {
            key_limit: key,
            sample_id: rec.sample_id as u16,
            frequency_multiplier: rec.frequency_multiplier,
            pan: Some(rec.pan),
        });
    }
    Ok(inst)
}
