//! Sample metadata and decoded PCM.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Name of a wave archive file. The on-disk record reserves 0x70 bytes for it.
pub type ArchiveName = ArrayString<0x70>;

/// Logical position of a sample inside a wave system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleLocation {
    /// Index of the wave archive inside the wave system
    pub wave_system_index: u16,
    /// Slot of the sample within that archive
    pub index: u32,
}

/// Per-wave metadata read from a wave system's archive table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveInfo {
    /// Wave archive file holding the compressed payload
    pub archive: ArchiveName,
    /// Slot inside the archive (also the staged file suffix)
    pub slot: u32,
    pub root_key: u8,
    /// Playback rate in Hz
    pub sample_rate: u32,
    /// Absolute offset of the compressed payload inside the archive file
    pub source_offset: u32,
    /// Length of the compressed payload in bytes
    pub source_length: u32,
    pub is_looping: bool,
    /// Loop start in frames
    pub loop_start: u32,
    /// Loop end in frames
    pub loop_end: u32,
}

/// A playable sample with its PCM payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Key the sample sounds at without pitch shifting (0-127)
    pub root_key: u8,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub is_looping: bool,
    /// Loop start in frames
    pub loop_start: u32,
    /// Loop end in frames; PCM past this point has already been dropped
    pub loop_end: u32,
    /// Little-endian PCM bytes
    pub data: Vec<u8>,
}

impl Sample {
    /// Bytes per interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.channels as usize
    }

    /// Length in frames.
    pub fn frames(&self) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample loops over a non-empty range.
    pub fn has_loop(&self) -> bool {
        self.is_looping && self.loop_end > self.loop_start
    }
}
