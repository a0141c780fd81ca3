//! Instrument and key-mapping types.

use alloc::vec::Vec;

/// Highest valid MIDI-style key, pan or key limit value.
pub const MAX_KEY: u8 = 127;

/// How an instrument maps keys to its sample entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Entries sorted by ascending key limit; a key uses the first entry
    /// whose limit is at or above it.
    Melodic,
    /// One entry per key slot; missing slots are holes.
    Percussion,
}

/// One sample reference inside an instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleEntry {
    /// Upper key limit (melodic) or the slot's own key (percussion), 0-127
    pub key_limit: u8,
    /// Sample id inside the instrument bank's wave system
    pub sample_id: u16,
    /// Per-sample frequency multiplier
    pub frequency_multiplier: f32,
    /// Pan position 0-127, only present on percussion entries
    pub pan: Option<u8>,
}

/// A resolved instrument definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    pub kind: InstrumentKind,
    /// Ordered sample entries
    pub entries: Vec<SampleEntry>,
    /// Multiplier applied to every sample of the instrument (1.0 for percussion)
    pub frequency_multiplier: f32,
}

impl Instrument {
    /// Create an empty melodic instrument.
    pub fn melodic(frequency_multiplier: f32) -> Self {
        Self {
            kind: InstrumentKind::Melodic,
            entries: Vec::new(),
            frequency_multiplier,
        }
    }

    /// Create an empty percussion instrument.
    pub fn percussion() -> Self {
        Self {
            kind: InstrumentKind::Percussion,
            entries: Vec::new(),
            frequency_multiplier: 1.0,
        }
    }

    pub fn is_percussion(&self) -> bool {
        self.kind == InstrumentKind::Percussion
    }

    /// Index of the entry that plays `key`, if any.
    pub fn entry_index(&self, key: u8) -> Option<usize> {
        match self.kind {
            InstrumentKind::Melodic => self.entries.iter().position(|e| e.key_limit >= key),
            InstrumentKind::Percussion => self.entries.iter().position(|e| e.key_limit == key),
        }
    }

    /// The entry that plays `key`, if any.
    pub fn entry_for_key(&self, key: u8) -> Option<&SampleEntry> {
        self.entry_index(key).map(|i| &self.entries[i])
    }

    /// Sample ids used by this instrument, in entry order.
    pub fn sample_ids(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.sample_id).collect()
    }
}
