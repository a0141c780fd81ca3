//! Staged PCM: previously decoded waves stored as plain WAV files.
//!
//! The sample bank does not decode ADPCM itself. Waves are extracted once
//! (see `ja-master`'s wave extractor) into `<archive>_<slot:08x>.wav` files
//! and loaded back through a [`PcmStage`].

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{FormatError, Result};

/// Decoded little-endian PCM plus its format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedPcm {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl StagedPcm {
    /// 16-bit mono PCM from samples.
    pub fn mono16(samples: &[i16], sample_rate: u32) -> Self {
        Self {
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            sample_rate,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.channels as usize
    }
}

/// Source of staged PCM keyed by wave archive name and slot.
pub trait PcmStage {
    fn load(&self, archive: &str, slot: u32) -> Result<StagedPcm>;
}

impl<T: PcmStage + ?Sized> PcmStage for &T {
    fn load(&self, archive: &str, slot: u32) -> Result<StagedPcm> {
        (**self).load(archive, slot)
    }
}

impl<T: PcmStage + ?Sized> PcmStage for Box<T> {
    fn load(&self, archive: &str, slot: u32) -> Result<StagedPcm> {
        (**self).load(archive, slot)
    }
}

/// File name a staged wave is stored under.
pub fn staged_file_name(archive: &str, slot: u32) -> String {
    format!("{}_{:08x}.wav", archive, slot)
}

/// Staged waves in one directory.
#[derive(Clone, Debug)]
pub struct WaveDirectory {
    root: PathBuf,
}

impl WaveDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, archive: &str, slot: u32) -> PathBuf {
        self.root.join(staged_file_name(archive, slot))
    }
}

impl PcmStage for WaveDirectory {
    fn load(&self, archive: &str, slot: u32) -> Result<StagedPcm> {
        let path = self.path_for(archive, slot);
        if !path.is_file() {
            return Err(FormatError::MissingExternalResource { path });
        }
        read_wav(&path)
    }
}

/// Read a WAV file into little-endian PCM bytes.
pub fn read_wav(path: &Path) -> Result<StagedPcm> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let mut data = Vec::with_capacity(reader.len() as usize * (spec.bits_per_sample as usize / 8));
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => {
            for s in reader.samples::<f32>() {
                data.extend_from_slice(&s?.to_le_bytes());
            }
        }
        (SampleFormat::Int, 8) => {
            // 8-bit WAV is unsigned on disk.
            for s in reader.samples::<i8>() {
                data.push((s? as i16 + 128) as u8);
            }
        }
        (SampleFormat::Int, 16) => {
            for s in reader.samples::<i16>() {
                data.extend_from_slice(&s?.to_le_bytes());
            }
        }
        (SampleFormat::Int, bits) => {
            let width = bits as usize / 8;
            for s in reader.samples::<i32>() {
                data.extend_from_slice(&s?.to_le_bytes()[..width]);
            }
        }
    }
    Ok(StagedPcm {
        data,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        channels: spec.channels,
    })
}

/// Write 16-bit mono samples as a WAV file.
pub fn write_wav_mono16(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(BufWriter::new(File::create(path)?), spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// In-memory staged PCM.
#[derive(Clone, Debug, Default)]
pub struct MemoryStage {
    waves: HashMap<(String, u32), StagedPcm>,
}

impl MemoryStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archive: &str, slot: u32, pcm: StagedPcm) {
        self.waves.insert((archive.to_string(), slot), pcm);
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }
}

impl PcmStage for MemoryStage {
    fn load(&self, archive: &str, slot: u32) -> Result<StagedPcm> {
        self.waves
            .get(&(archive.to_string(), slot))
            .cloned()
            .ok_or_else(|| FormatError::MissingExternalResource {
                path: PathBuf::from(staged_file_name(archive, slot)),
            })
    }
}
