//! Synthetic archive builders for tests.
//!
//! Produces the smallest byte layouts the decoders accept: wave systems with
//! one archive, instrument banks with a single `LIST` chunk, and `AA_<`
//! archives pointing at them.

use crate::container::{ARCHIVE_END, ARCHIVE_MAGIC, BFCA, BNK, WS};
use crate::instrument_bank::{IBNK, INST, LIST, PERC, PMAP};
use crate::sample_bank::{CDF, SCNE, WBCT, WINF, WSYS};
use crate::sequence::opcode;
use crate::tag::Tag;
use crate::writer::ByteWriter;

/// One wave of a synthetic wave system.
#[derive(Clone, Copy, Debug)]
pub struct WaveDef {
    pub id: u16,
    pub root_key: u8,
    pub sample_rate: u32,
    pub source_offset: u32,
    pub source_length: u32,
    pub looping: bool,
    pub loop_start: u32,
    pub loop_end: u32,
}

impl WaveDef {
    pub fn new(id: u16, root_key: u8) -> Self {
        Self {
            id,
            root_key,
            sample_rate: 32000,
            source_offset: 0,
            source_length: 0,
            looping: false,
            loop_start: 0,
            loop_end: 0,
        }
    }

    pub fn looping(mut self, loop_start: u32, loop_end: u32) -> Self {
        self.looping = true;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self
    }

    pub fn source(mut self, offset: u32, length: u32) -> Self {
        self.source_offset = offset;
        self.source_length = length;
        self
    }
}

/// One instrument of a synthetic bank.
#[derive(Clone, Debug)]
pub enum InstrumentDef {
    /// `(key_limit, sample_id, multiplier)` entries plus the instrument multiplier
    Melodic {
        entries: Vec<(u8, u16, f32)>,
        multiplier: f32,
    },
    /// Slot index is the key; `(sample_id, multiplier, pan)`
    Percussion { slots: Vec<Option<(u16, f32, u8)>> },
}

/// Wave system blob with one wave archive named `archive`.
pub fn wave_system(archive: &str, waves: &[WaveDef]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.tag(WSYS).u32(0).u32(0).u32(0).u32(0x20).u32(0);
    w.seek(0x20).tag(WINF).u32(1).u32(0x40);

    w.seek(0x40).cstr(archive);
    w.seek(0x40 + 0x70).u32(waves.len() as u32);
    let table = w.tell();
    w.zeros(4 * waves.len()).align(0x20);
    for (i, wave) in waves.iter().enumerate() {
        let at = w.tell();
        w.patch_u32(table + 4 * i, at as u32);
        w.u8(0xAA).u8(0xFF).u8(wave.root_key).u8(0).u8(0);
        w.u16((wave.sample_rate * 2) as u16).u8(0);
        w.u32(wave.source_offset).u32(wave.source_length);
        w.u32(if wave.looping { 0xFFFF_FFFF } else { 0 });
        w.u32(wave.loop_start).u32(wave.loop_end);
    }

    let wbct = w.tell();
    w.patch_u32(0x14, wbct as u32);
    w.tag(WBCT).u32(0).u32(1).u32(0);
    let scne = w.tell();
    w.patch_u32(wbct + 0x0C, scne as u32);
    w.tag(SCNE).u32(0).u32(0).u32(0);
    let cdf = w.tell();
    w.patch_u32(scne + 12, cdf as u32);
    w.tag(CDF).u32(waves.len() as u32);
    let records = w.tell();
    w.zeros(4 * waves.len());
    for (i, wave) in waves.iter().enumerate() {
        let at = w.tell();
        w.patch_u32(records + 4 * i, at as u32);
        w.i16(0).i16(wave.id as i16);
    }
    w.align(0x20);
    finish_sized(w)
}

/// Instrument bank blob with id `id`.
pub fn instrument_bank(id: u32, instruments: &[InstrumentDef]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.tag(IBNK).u32(0).u32(id).seek(0x20);
    w.tag(LIST).u32(0);
    let list = w.tell();
    w.u32(instruments.len() as u32).zeros(4 * instruments.len());

    for (i, inst) in instruments.iter().enumerate() {
        let at = w.tell();
        w.patch_u32(list + 4 + 4 * i, at as u32);
        match inst {
            InstrumentDef::Melodic { entries, multiplier } => {
                w.tag(INST).zeros(12).u32(entries.len() as u32);
                for &(key_limit, sample_id, mult) in entries {
                    w.u8(key_limit).zeros(11).u32(sample_id as u32).zeros(4).f32(mult);
                }
                w.zeros(4).f32(*multiplier);
            }
            InstrumentDef::Percussion { slots } => {
                w.tag(PERC).u32(slots.len() as u32);
                let table = w.tell();
                w.zeros(4 * slots.len());
                for (key, slot) in slots.iter().enumerate() {
                    if let Some((sample_id, mult, pan)) = slot {
                        let entry = w.tell();
                        w.patch_u32(table + 4 * key, entry as u32);
                        w.tag(PMAP).zeros(4).f32(*mult).u8(*pan).zeros(15).u32(*sample_id as u32);
                    }
                }
            }
        }
    }
    w.align(0x20);
    finish_sized(w)
}

/// Write the total blob size at +4, as indirect archive entries expect.
fn finish_sized(mut w: ByteWriter) -> Vec<u8> {
    let len = w.len() as u32;
    w.patch_u32(4, len);
    w.into_inner()
}

/// Minimal RARC-like blob of `len` bytes (at least 8).
pub fn rarc(len: usize) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.tag(Tag::new(b"RARC")).u32(len as u32);
    w.zeros(len.saturating_sub(8));
    w.into_inner()
}

enum Entry {
    Range(Tag, Vec<u8>),
    WaveSystem(u32, Vec<u8>),
    Bank(u32, Vec<u8>),
    Rarc(Vec<u8>),
}

/// Builds an `AA_<` archive from blobs.
#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<Entry>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit `(start, end)` entry such as `bst `.
    pub fn range(mut self, tag: Tag, blob: Vec<u8>) -> Self {
        self.entries.push(Entry::Range(tag, blob));
        self
    }

    pub fn wave_system(mut self, id: u32, blob: Vec<u8>) -> Self {
        self.entries.push(Entry::WaveSystem(id, blob));
        self
    }

    pub fn instrument_bank(mut self, wave_system: u32, blob: Vec<u8>) -> Self {
        self.entries.push(Entry::Bank(wave_system, blob));
        self
    }

    pub fn rarc(mut self, blob: Vec<u8>) -> Self {
        self.entries.push(Entry::Rarc(blob));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.tag(ARCHIVE_MAGIC);
        // (field position, blob, explicit end field)
        let mut fixups = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Range(tag, blob) => {
                    w.tag(*tag);
                    fixups.push((w.tell(), blob, true));
                    w.u32(0).u32(0);
                }
                Entry::WaveSystem(id, blob) => {
                    w.tag(WS).u32(*id);
                    fixups.push((w.tell(), blob, false));
                    w.u32(0).u32(0);
                }
                Entry::Bank(wave_system, blob) => {
                    w.tag(BNK).u32(*wave_system);
                    fixups.push((w.tell(), blob, false));
                    w.u32(0);
                }
                Entry::Rarc(blob) => {
                    w.tag(BFCA);
                    fixups.push((w.tell(), blob, false));
                    w.u32(0);
                }
            }
        }
        w.tag(ARCHIVE_END).align(0x20);

        for (field, blob, explicit) in fixups {
            let start = w.tell();
            w.bytes(blob).align(0x20);
            w.patch_u32(field, start as u32);
            if explicit {
                w.patch_u32(field + 4, (start + blob.len()) as u32);
            }
        }
        w.into_inner()
    }
}

/// A one-track BMS: tempo and resolution in the header, then `track` bytes
/// at 0x20 for track 0.
pub fn single_track_sequence(tempo: u16, ticks_per_beat: u16, track: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u8(opcode::ARTICULATION)
        .u8(opcode::ARTICULATION_TIME_RESOLUTION)
        .u16(ticks_per_beat);
    w.u8(opcode::TEMPO).u16(tempo);
    w.u8(opcode::TRACK).u32(0x18);
    w.u8(opcode::TERMINATE);
    w.seek(0x18).u8(opcode::TRACK).u8(0).u24(0x20).u8(opcode::TERMINATE);
    w.seek(0x20).bytes(track);
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{read_chunks, Archive, ChunkKind};
    use crate::sequence::Bms;
    use crate::staging::{MemoryStage, StagedPcm};

    #[test]
    fn built_archive_opens() {
        let wsys = wave_system("Synth_0.aw", &[WaveDef::new(5, 60)]);
        let bank = instrument_bank(
            2,
            &[InstrumentDef::Melodic {
                entries: vec![(127, 5, 1.0)],
                multiplier: 1.0,
            }],
        );
        let data = ArchiveBuilder::new()
            .wave_system(0, wsys)
            .instrument_bank(0, bank)
            .rarc(rarc(0x40))
            .build();

        let kinds: Vec<_> = read_chunks(&data).unwrap().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::WaveSystem { id: 0 },
                ChunkKind::InstrumentBank { id: 2, wave_system: 0 },
                ChunkKind::Rarc,
            ]
        );

        let archive = Archive::from_bytes(data).unwrap();
        let bank = archive.instrument_bank(2).unwrap();
        let inst = bank.instrument(0).unwrap();
        let entry = inst.entry_for_key(64).unwrap();
        let wsys = archive.wave_system(bank.wave_system()).unwrap();

        let mut stage = MemoryStage::new();
        stage.insert("Synth_0.aw", 0, StagedPcm::mono16(&[1, 2, 3], 32000));
        let sample = wsys.sample(entry.sample_id, &stage).unwrap();
        assert_eq!(sample.root_key, 60);
        assert_eq!(sample.data.len(), 6);
    }

    #[test]
    fn single_track_sequence_decodes() {
        let data = single_track_sequence(140, 48, &[opcode::TERMINATE]);
        let seq = Bms::decode(&data).unwrap();
        assert_eq!(seq.tracks.len(), 1);
        assert_eq!(seq.tracks[0].start_offset, 0x20);
        assert_eq!(seq.meta_track.len(), 3);
    }
}
