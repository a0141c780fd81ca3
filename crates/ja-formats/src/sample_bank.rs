//! WSYS wave system resolver.
//!
//! Layout, all offsets relative to the blob:
//!
//! * header: `WSYS`, then the `WINF` offset at 0x10 and the `WBCT` offset
//!   at 0x14
//! * `WINF`: archive count, then one pointer per wave archive record
//!   (name at +0, wave count at +0x70, wave pointers from +0x74)
//! * `WBCT`: one `SCNE` per archive, each pointing at a `C-DF` table of
//!   `(wave system index, sample id)` records
//!
//! The id → location map is built eagerly; wave metadata is read on demand.

use std::collections::BTreeMap;

use binrw::BinRead;
use ja_ir::{ArchiveName, Sample, SampleLocation, WaveInfo};
use tracing::{debug, trace};

use crate::cursor::{ByteCursor, ByteSource, Record, VirtualRegion};
use crate::error::{FormatError, Result};
use crate::staging::PcmStage;
use crate::tag::Tag;

pub const WSYS: Tag = Tag::new(b"WSYS");
pub const WINF: Tag = Tag::new(b"WINF");
pub const WBCT: Tag = Tag::new(b"WBCT");
pub const SCNE: Tag = Tag::new(b"SCNE");
pub const CDF: Tag = Tag::new(b"C-DF");

const WINF_POINTER: u64 = 0x10;
const WBCT_POINTER: u64 = 0x14;
/// Size of the name field at the start of a wave archive record.
const ARCHIVE_NAME_LEN: u64 = 0x70;
const ARCHIVE_WAVE_COUNT: u64 = 0x70;
const ARCHIVE_WAVE_TABLE: u64 = 0x74;
/// Loop flag value marking a looping wave.
const LOOPING: u32 = 0xFFFF_FFFF;

#[derive(BinRead, Debug)]
#[br(big)]
struct WaveRecord {
    #[br(pad_before = 2)]
    root_key: u8,
    #[br(pad_before = 2)]
    rate_field: u16,
    #[br(pad_before = 1)]
    source_offset: u32,
    source_length: u32,
    loop_flag: u32,
    loop_start: u32,
    loop_end: u32,
}

impl Record for WaveRecord {
    const SIZE: usize = 28;
}

impl WaveRecord {
    fn into_info(self, archive: ArchiveName, slot: u32) -> WaveInfo {
        WaveInfo {
            archive,
            slot,
            root_key: self.root_key,
            // The field stores twice the playback rate.
            sample_rate: self.rate_field as u32 / 2,
            source_offset: self.source_offset,
            source_length: self.source_length,
            is_looping: self.loop_flag == LOOPING,
            loop_start: self.loop_start,
            loop_end: self.loop_end,
        }
    }
}

/// One wave archive file and every wave stored in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveArchive {
    pub name: ArchiveName,
    pub waves: Vec<WaveInfo>,
}

/// Resolves sample ids to wave metadata and staged PCM.
#[derive(Debug)]
pub struct SampleBank<S> {
    source: S,
    winf_offset: u64,
    archives: Vec<ArchiveName>,
    locations: BTreeMap<u16, SampleLocation>,
}

impl<S: ByteSource> SampleBank<S> {
    /// Validate the header and build the sample id map.
    pub fn new(source: S) -> Result<Self> {
        let mut c = ByteCursor::new(&source);
        c.expect_tag(WSYS)?;
        c.seek(WINF_POINTER)?;
        let winf_offset = c.read_u32()? as u64;
        c.seek(WBCT_POINTER)?;
        let wbct_offset = c.read_u32()? as u64;

        c.seek(winf_offset)?;
        c.expect_tag(WINF)?;
        let files = c.read_u32()?;
        let mut archives = Vec::new();
        for i in 0..files as u64 {
            c.seek(winf_offset + 8 + 4 * i)?;
            let record = c.read_u32()? as u64;
            archives.push(read_archive_name(&source, record)?);
        }

        c.seek(wbct_offset)?;
        c.expect_tag(WBCT)?;
        c.skip(4)?;
        let scenes = c.read_u32()?;
        if scenes != files {
            return Err(FormatError::TableMismatch {
                what: "wave scene table",
                expected: files,
                found: scenes,
            });
        }

        let mut locations = BTreeMap::new();
        for u in 0..files as u64 {
            c.seek(wbct_offset + 0x0C + 4 * u)?;
            let scene = c.read_u32()? as u64;
            c.seek(scene)?;
            c.expect_tag(SCNE)?;
            c.skip(8)?;
            let cdf = c.read_u32()? as u64;
            c.seek(cdf)?;
            c.expect_tag(CDF)?;
            let count = c.read_u32()?;
            let table = c.tell();
            for slot in 0..count {
                c.seek(table + 4 * slot as u64)?;
                let record = c.read_u32()? as u64;
                c.seek(record)?;
                let wave_system_index = c.read_i16()? as u16;
                let id = c.read_i16()? as u16;
                let loc = SampleLocation {
                    wave_system_index,
                    index: slot,
                };
                if locations.contains_key(&id) {
                    trace!(id, ?loc, "duplicate sample id ignored");
                } else {
                    locations.insert(id, loc);
                }
            }
        }

        debug!(archives = archives.len(), samples = locations.len(), "wave system");
        Ok(Self {
            source,
            winf_offset,
            archives,
            locations,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Wave archive file names in table order.
    pub fn archive_names(&self) -> &[ArchiveName] {
        &self.archives
    }

    pub fn contains(&self, id: u16) -> bool {
        self.locations.contains_key(&id)
    }

    /// Number of distinct sample ids.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Known sample ids in ascending order.
    pub fn sample_ids(&self) -> Vec<u16> {
        self.locations.keys().copied().collect()
    }

    pub fn location(&self, id: u16) -> Option<SampleLocation> {
        self.locations.get(&id).copied()
    }

    /// Metadata for sample `id`, without touching staged PCM.
    pub fn wave_info(&self, id: u16) -> Result<WaveInfo> {
        let loc = self.location(id).ok_or(FormatError::SampleNotFound { id })?;
        let archive = self
            .archives
            .get(loc.wave_system_index as usize)
            .copied()
            .ok_or(FormatError::IndexOutOfRange {
                what: "wave archive",
                index: loc.wave_system_index as u32,
                count: self.archives.len() as u32,
            })?;

        let mut c = ByteCursor::new(&self.source);
        c.seek(self.winf_offset + 8 + 4 * loc.wave_system_index as u64)?;
        let record = c.read_u32()? as u64;
        c.seek(record + ARCHIVE_WAVE_TABLE + 4 * loc.index as u64)?;
        let wave = c.read_u32()? as u64;
        c.seek(wave)?;
        let rec: WaveRecord = c.read_record()?;
        Ok(rec.into_info(archive, loc.index))
    }

    /// Resolve sample `id` with PCM loaded from `stage`.
    ///
    /// Looping samples keep only the PCM up to their loop end.
    pub fn sample<P: PcmStage + ?Sized>(&self, id: u16, stage: &P) -> Result<Sample> {
        let info = self.wave_info(id)?;
        let pcm = stage.load(&info.archive, info.slot)?;
        let mut data = pcm.data;
        if info.is_looping {
            let frame = pcm.bits_per_sample as usize / 8 * pcm.channels as usize;
            data.truncate((info.loop_end as usize).saturating_mul(frame));
        }
        Ok(Sample {
            root_key: info.root_key,
            sample_rate: pcm.sample_rate,
            bits_per_sample: pcm.bits_per_sample,
            channels: pcm.channels,
            is_looping: info.is_looping,
            loop_start: info.loop_start,
            loop_end: info.loop_end,
            data,
        })
    }

    /// Every wave archive with the metadata of all its waves, in table order.
    pub fn wave_archives(&self) -> Result<Vec<WaveArchive>> {
        let mut c = ByteCursor::new(&self.source);
        let mut out = Vec::with_capacity(self.archives.len());
        for (i, name) in self.archives.iter().enumerate() {
            c.seek(self.winf_offset + 8 + 4 * i as u64)?;
            let record = c.read_u32()? as u64;
            c.seek(record + ARCHIVE_WAVE_COUNT)?;
            let count = c.read_u32()?;
            let mut waves = Vec::new();
            for slot in 0..count {
                c.seek(record + ARCHIVE_WAVE_TABLE + 4 * slot as u64)?;
                let wave = c.read_u32()? as u64;
                c.seek(wave)?;
                let rec: WaveRecord = c.read_record()?;
                waves.push(rec.into_info(*name, slot));
            }
            out.push(WaveArchive { name: *name, waves });
        }
        Ok(out)
    }
}

/// Read the null-terminated name at the start of an archive record.
fn read_archive_name<S: ByteSource>(source: &S, record: u64) -> Result<ArchiveName> {
    let field = VirtualRegion::new(source, record, ARCHIVE_NAME_LEN)?;
    let name = ByteCursor::new(&field).read_null_terminated_string()?;
    ArchiveName::from(name.as_str()).map_err(|_| FormatError::UnexpectedEndOfData { offset: record })
}
