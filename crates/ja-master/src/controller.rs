//! Archive controller: instrument and sample caches plus sequence walking.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ja_engine::{note_frequency_ratio, PlayerCommand, PlayerConfig, SequencePlayer};
use ja_formats::{Archive, ByteSource, FileSource, FormatError, PcmStage, Result, WaveDirectory};
use ja_ir::{Instrument, Sample, SampleEntry, Sequence};
use tracing::{debug, info, warn};

/// Counts from one [`Controller::preload`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub instruments: usize,
    pub samples: usize,
    /// Sample ids referenced by an instrument but absent from its wave system
    pub skipped: usize,
}

/// A note resolved down to its sample.
#[derive(Debug)]
pub struct ResolvedNote<'c> {
    pub entry: SampleEntry,
    pub sample: &'c Sample,
    /// Playback rate relative to the sample's own rate
    pub frequency_ratio: f32,
}

/// Summary of a resolved note, detached from the caches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteInfo {
    pub sample_id: u16,
    pub frequency_ratio: f32,
    pub sample_bytes: usize,
}

/// One player command with the tick it fired on.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedCommand {
    pub tick: u64,
    pub command: PlayerCommand,
    /// Set for note-ons whose instrument and sample resolved
    pub note: Option<NoteInfo>,
}

/// Headless controller: owns an archive and the PCM stage its samples come
/// from, and caches what it resolves.
pub struct Controller<S, P> {
    archive: Archive<S>,
    stage: P,
    instruments: HashMap<(u8, u8), Instrument>,
    samples: HashMap<(u32, u16), Sample>,
}

impl Controller<Arc<FileSource>, WaveDirectory> {
    /// Open an archive file with staged waves under `waves`.
    pub fn open(archive: impl AsRef<Path>, waves: impl AsRef<Path>) -> Result<Self> {
        let archive = Archive::open_file(archive)?;
        Ok(Self::new(archive, WaveDirectory::new(waves.as_ref())))
    }
}

impl<S: ByteSource + Clone, P: PcmStage> Controller<S, P> {
    pub fn new(archive: Archive<S>, stage: P) -> Self {
        Self {
            archive,
            stage,
            instruments: HashMap::new(),
            samples: HashMap::new(),
        }
    }

    pub fn archive(&self) -> &Archive<S> {
        &self.archive
    }

    pub fn stage(&self) -> &P {
        &self.stage
    }

    pub fn cached_instruments(&self) -> usize {
        self.instruments.len()
    }

    pub fn cached_samples(&self) -> usize {
        self.samples.len()
    }

    // --- Lookups ---

    /// Instrument `program` of bank `bank`, cached after the first call.
    pub fn instrument(&mut self, bank: u8, program: u8) -> Result<&Instrument> {
        match self.instruments.entry((bank, program)) {
            Entry::Occupied(e) => Ok(&*e.into_mut()),
            Entry::Vacant(e) => {
                let bank_data = instrument_bank(&self.archive, bank)?;
                Ok(&*e.insert(bank_data.instrument(program as u32)?))
            }
        }
    }

    /// Sample `id` of wave system `wave_system`, cached after the first call.
    pub fn sample(&mut self, wave_system: u32, id: u16) -> Result<&Sample> {
        match self.samples.entry((wave_system, id)) {
            Entry::Occupied(e) => Ok(&*e.into_mut()),
            Entry::Vacant(e) => {
                let bank = self.archive.wave_system(wave_system).ok_or_else(|| {
                    FormatError::ChunkNotFound {
                        what: format!("wave system {wave_system}"),
                    }
                })?;
                Ok(&*e.insert(bank.sample(id, &self.stage)?))
            }
        }
    }

    /// Resolve `key` on instrument `(bank, program)`.
    ///
    /// `Ok(None)` when the instrument has no entry for the key.
    pub fn resolve_note(&mut self, bank: u8, program: u8, key: u8) -> Result<Option<ResolvedNote<'_>>> {
        let inst = self.instrument(bank, program)?;
        let Some(entry) = inst.entry_for_key(key).copied() else {
            return Ok(None);
        };
        let percussion = inst.is_percussion();
        let instrument_multiplier = inst.frequency_multiplier;

        let wave_system = instrument_bank(&self.archive, bank)?.wave_system();
        let sample = self.sample(wave_system, entry.sample_id)?;
        let frequency_ratio = note_frequency_ratio(
            key,
            sample.root_key,
            entry.frequency_multiplier,
            instrument_multiplier,
            percussion,
        );
        Ok(Some(ResolvedNote {
            entry,
            sample,
            frequency_ratio,
        }))
    }

    // --- Sequences ---

    /// Load every instrument the sequence selects, and their samples.
    ///
    /// Bank 0 is never loaded. Samples missing from their wave system are
    /// skipped; any other failure aborts.
    pub fn preload(&mut self, sequence: &Sequence) -> Result<PreloadSummary> {
        let mut summary = PreloadSummary::default();
        for (bank, program) in sequence.instrument_selections() {
            if bank == 0 {
                continue;
            }
            let ids = self.instrument(bank, program)?.sample_ids();
            summary.instruments += 1;

            let wave_system = instrument_bank(&self.archive, bank)?.wave_system();
            for id in ids {
                if self.samples.contains_key(&(wave_system, id)) {
                    continue;
                }
                match self.sample(wave_system, id) {
                    Ok(_) => summary.samples += 1,
                    Err(FormatError::SampleNotFound { id }) => {
                        warn!(bank, program, id, "sample missing from wave system, skipped");
                        summary.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        info!(
            instruments = summary.instruments,
            samples = summary.samples,
            skipped = summary.skipped,
            "preloaded sequence"
        );
        Ok(summary)
    }

    /// Walk `sequence` offline for at most `max_ticks` ticks, resolving
    /// every note-on against the archive.
    ///
    /// Notes whose instrument, bank or sample cannot be found are still
    /// reported, just without [`NoteInfo`].
    pub fn render_commands(
        &mut self,
        sequence: &Sequence,
        config: PlayerConfig,
        max_ticks: u64,
    ) -> Result<Vec<RenderedCommand>> {
        let mut player = SequencePlayer::new(sequence, config);
        let mut out = Vec::new();
        while player.tick() < max_ticks && !player.is_finished() {
            let tick = player.tick();
            for command in player.step() {
                let note = match command {
                    PlayerCommand::NoteOn { bank, program, key, .. } => {
                        self.note_info(bank, program, key)?
                    }
                    _ => None,
                };
                out.push(RenderedCommand { tick, command, note });
            }
        }
        Ok(out)
    }

    fn note_info(&mut self, bank: u8, program: u8, key: u8) -> Result<Option<NoteInfo>> {
        match self.resolve_note(bank, program, key) {
            Ok(note) => Ok(note.map(|n| NoteInfo {
                sample_id: n.entry.sample_id,
                frequency_ratio: n.frequency_ratio,
                sample_bytes: n.sample.data.len(),
            })),
            Err(e) if is_unplayable(&e) => {
                debug!(bank, program, key, error = %e, "note not resolved");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn instrument_bank<S: ByteSource + Clone>(
    archive: &Archive<S>,
    bank: u8,
) -> Result<&ja_formats::InstrumentBank<ja_formats::VirtualRegion<S>>> {
    archive
        .instrument_bank(bank as u32)
        .ok_or_else(|| FormatError::ChunkNotFound {
            what: format!("instrument bank {bank}"),
        })
}

/// Errors that only mean a note stays silent.
fn is_unplayable(e: &FormatError) -> bool {
    e.is_lookup_miss()
        || matches!(
            e,
            FormatError::ChunkNotFound { .. } | FormatError::MissingExternalResource { .. }
        )
}
