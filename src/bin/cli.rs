//! ja-cli: inspect JAudio sound archives and sequences.
//!
//! Usage:
//!   ja-cli info Z2Sound.baa
//!   ja-cli split Z2Sound.baa --out blobs/
//!   ja-cli extract-waves blobs/Z2Sound.0.wsys --waves Waves/
//!   ja-cli sequence bgm.bms --events
//!   ja-cli instrument Z2Sound.baa 3 12
//!   ja-cli play Z2Sound.baa bgm.bms --ticks 2000

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ja_formats::{Bms, ByteSource, DecodeLimits, FileSource};
use ja_ir::{EventPayload, InstrumentKind, Sequence, SequenceEvent};
use ja_master::{extract_waves, split_archive, Archive, Controller, PlayerCommand, PlayerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ja-cli")]
#[command(about = "Decode JAudio sound archives, banks and BMS sequences")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List an archive's chunks, wave systems and instrument banks
    Info {
        archive: PathBuf,
    },

    /// Write every blob of an archive to its own file
    Split {
        archive: PathBuf,
        /// Output directory (defaults to the archive's directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Base file name (defaults to the archive's file stem)
        #[arg(long)]
        base: Option<String>,
    },

    /// Decode the waves of a wave system blob to WAV files
    ExtractWaves {
        wave_system: PathBuf,
        /// Directory holding the wave archives (defaults to `<wsys dir>/Waves`)
        #[arg(long)]
        waves: Option<PathBuf>,
    },

    /// Decode a BMS sequence and summarize it
    Sequence {
        sequence: PathBuf,
        /// Print every event
        #[arg(long)]
        events: bool,
        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Print one instrument of an archive's bank
    Instrument {
        archive: PathBuf,
        bank: u32,
        program: u32,
    },

    /// Walk a sequence offline and print the commands it produces
    Play {
        archive: PathBuf,
        sequence: PathBuf,
        #[command(flatten)]
        waves: WavesArg,
        /// Stop after this many ticks
        #[arg(long, default_value_t = 2000)]
        ticks: u64,
        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(Args)]
struct LimitArgs {
    /// Deepest allowed reference nesting
    #[arg(long, default_value_t = DecodeLimits::default().max_call_depth)]
    max_call_depth: usize,
    /// Opcode budget per decode phase
    #[arg(long, default_value_t = DecodeLimits::default().max_steps)]
    max_steps: usize,
}

impl From<&LimitArgs> for DecodeLimits {
    fn from(args: &LimitArgs) -> Self {
        DecodeLimits {
            max_call_depth: args.max_call_depth,
            max_steps: args.max_steps,
        }
    }
}

#[derive(Args)]
struct WavesArg {
    /// Directory of staged WAV files (defaults to `<archive dir>/Waves`)
    #[arg(long)]
    waves: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Info { archive } => print_info(&archive),
        Commands::Split { archive, out, base } => split(&archive, out, base),
        Commands::ExtractWaves { wave_system, waves } => extract(&wave_system, waves),
        Commands::Sequence { sequence, events, limits } => {
            let seq = decode_sequence(&sequence, &limits)?;
            print_sequence(&seq, events);
            Ok(())
        }
        Commands::Instrument { archive, bank, program } => print_instrument(&archive, bank, program),
        Commands::Play {
            archive,
            sequence,
            waves,
            ticks,
            limits,
        } => play(&archive, &sequence, waves.waves, ticks, &limits),
    }
}

fn open_archive(path: &Path) -> Result<Archive<Arc<FileSource>>> {
    Archive::open_file(path).with_context(|| format!("Failed to open archive {}", path.display()))
}

fn sibling_dir(path: &Path, name: &str) -> PathBuf {
    path.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

// ---------------------------------------------------------------------------
// Archives
// ---------------------------------------------------------------------------

fn print_info(path: &Path) -> Result<()> {
    let archive = open_archive(path)?;
    println!("Archive:  {}", path.display());
    println!("Chunks:   {}", archive.chunks().len());
    for chunk in archive.chunks() {
        println!(
            "  {} {:>8X}..{:<8X} {:>8} bytes  {:?}",
            chunk.tag,
            chunk.start,
            chunk.end,
            chunk.len(),
            chunk.kind
        );
    }

    println!();
    for (id, wsys) in archive.wave_systems() {
        let names: Vec<&str> = wsys.archive_names().iter().map(|n| n.as_str()).collect();
        println!("Wave system {id}: {} samples in {}", wsys.len(), names.join(", "));
    }
    for (id, bank) in archive.instrument_banks() {
        let count = bank
            .instrument_count()
            .with_context(|| format!("Failed to read instrument bank {id}"))?;
        println!(
            "Instrument bank {id}: {count} instruments, wave system {}",
            bank.wave_system()
        );
    }
    Ok(())
}

fn split(path: &Path, out: Option<PathBuf>, base: Option<String>) -> Result<()> {
    let source = FileSource::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let out = out.unwrap_or_else(|| sibling_dir(path, ""));
    let base = match base {
        Some(b) => b,
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("Archive path has no file name")?,
    };

    let files = split_archive(&source, &out, &base)
        .with_context(|| format!("Failed to split {}", path.display()))?;
    for file in &files {
        println!("{:>10} bytes  {}", file.len, file.path.display());
    }
    Ok(())
}

fn extract(path: &Path, waves: Option<PathBuf>) -> Result<()> {
    let source = FileSource::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let waves = waves.unwrap_or_else(|| sibling_dir(path, "Waves"));
    let written = extract_waves(source, &waves)
        .with_context(|| format!("Failed to extract waves of {}", path.display()))?;
    info!(files = written.len(), "done");
    println!("Wrote {} WAV files to {}", written.len(), waves.display());
    Ok(())
}

fn print_instrument(path: &Path, bank_id: u32, program: u32) -> Result<()> {
    let archive = open_archive(path)?;
    let bank = archive
        .instrument_bank(bank_id)
        .with_context(|| format!("No instrument bank {bank_id} in {}", path.display()))?;
    let inst = bank
        .instrument(program)
        .with_context(|| format!("Failed to read instrument {program} of bank {bank_id}"))?;
    let wsys = archive.wave_system(bank.wave_system());

    let kind = match inst.kind {
        InstrumentKind::Melodic => "melodic",
        InstrumentKind::Percussion => "percussion",
    };
    println!("Bank {bank_id}, program {program}: {kind}, multiplier {}", inst.frequency_multiplier);
    for entry in &inst.entries {
        let wave = wsys.and_then(|w| w.wave_info(entry.sample_id).ok());
        let wave = match wave {
            Some(w) => format!(
                "{}#{} root {} {} Hz{}",
                w.archive,
                w.slot,
                w.root_key,
                w.sample_rate,
                if w.is_looping { " loop" } else { "" }
            ),
            None => "missing".to_string(),
        };
        let pan = entry.pan.map(|p| format!(" pan {p}")).unwrap_or_default();
        println!(
            "  key {:>3}  sample {:>5}  x{:<6}{pan}  {wave}",
            entry.key_limit, entry.sample_id, entry.frequency_multiplier
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

fn decode_sequence(path: &Path, limits: &LimitArgs) -> Result<Sequence> {
    let source = FileSource::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    info!(bytes = source.len(), "decoding sequence");
    Bms::decode_with_limits(source, limits.into())
        .with_context(|| format!("Failed to decode sequence {}", path.display()))
}

fn print_sequence(seq: &Sequence, events: bool) {
    println!("Meta events:      {}", seq.meta_track.len());
    println!("Directory events: {}", seq.directory.len());
    println!("Tracks:           {}", seq.tracks.len());
    for track in &seq.tracks {
        println!(
            "  track {:>2} @ {:06X}: {} events",
            track.number,
            track.start_offset,
            track.events.len()
        );
    }
    let selections = seq.instrument_selections();
    if !selections.is_empty() {
        let list: Vec<String> = selections.iter().map(|(b, p)| format!("{b}:{p}")).collect();
        println!("Instruments:      {}", list.join(" "));
    }

    if events {
        print_events("meta", &seq.meta_track);
        print_events("directory", &seq.directory);
        for track in &seq.tracks {
            print_events(&format!("track {}", track.number), &track.events);
        }
    }
}

fn print_events(name: &str, events: &[SequenceEvent]) {
    println!();
    println!("[{name}]");
    for event in events {
        let text = match &event.payload {
            EventPayload::Marker { name } => format!("Marker {name:?}"),
            other => format!("{other:?}"),
        };
        println!("  {:06X}  {text}", event.origin_offset);
    }
}

fn play(
    archive: &Path,
    sequence: &Path,
    waves: Option<PathBuf>,
    ticks: u64,
    limits: &LimitArgs,
) -> Result<()> {
    let waves = waves.unwrap_or_else(|| sibling_dir(archive, "Waves"));
    let mut controller = Controller::open(archive, &waves)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let seq = decode_sequence(sequence, limits)?;
    controller.preload(&seq).context("Failed to preload instruments")?;

    let commands = controller
        .render_commands(&seq, PlayerConfig::default(), ticks)
        .context("Failed to walk sequence")?;
    for rendered in &commands {
        match (&rendered.command, rendered.note) {
            (PlayerCommand::NoteOn { .. }, Some(note)) => println!(
                "{:>6}  {:?}  sample {} ratio {:.3} ({} bytes)",
                rendered.tick, rendered.command, note.sample_id, note.frequency_ratio, note.sample_bytes
            ),
            (command, _) => println!("{:>6}  {:?}", rendered.tick, command),
        }
    }
    println!("{} commands", commands.len());
    Ok(())
}
