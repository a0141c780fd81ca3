//! Offline tools: split an archive into its blobs, and decode the waves of
//! a wave system to WAV files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ja_formats::{
    adpcm, read_chunks, staged_file_name, write_wav_mono16, ByteSource, ChunkEntry, ChunkKind,
    FileSource, FormatError, Result, SampleBank,
};
use tracing::{debug, info};

/// One blob written by [`split_archive`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitFile {
    pub kind: ChunkKind,
    pub path: PathBuf,
    pub len: u64,
}

/// File name for one archive blob: `<base>.bst`, `<base>.<id>.wsys`,
/// `<base>.<id>.bnk` and so on.
pub fn split_file_name(base: &str, kind: ChunkKind) -> String {
    match kind {
        ChunkKind::SoundTable => format!("{base}.bst"),
        ChunkKind::SoundTableNames => format!("{base}.bstn"),
        ChunkKind::SequenceCollection => format!("{base}.bsc"),
        ChunkKind::WaveSystem { id } => format!("{base}.{id}.wsys"),
        ChunkKind::InstrumentBank { id, .. } => format!("{base}.{id}.bnk"),
        ChunkKind::Rarc => format!("{base}.rarc"),
    }
}

/// Write every blob of the archive in `source` to `out_dir`.
///
/// A name that is already taken gets a `_<n>` suffix before its extension.
pub fn split_archive<S: ByteSource + ?Sized>(
    source: &S,
    out_dir: &Path,
    base: &str,
) -> Result<Vec<SplitFile>> {
    let chunks = read_chunks(&source)?;
    fs::create_dir_all(out_dir)?;

    let mut taken = HashSet::new();
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let name = unique_name(&mut taken, split_file_name(base, chunk.kind));
        let path = out_dir.join(name);
        let data = read_blob(source, chunk)?;
        fs::write(&path, &data)?;
        debug!(tag = %chunk.tag, path = %path.display(), len = data.len(), "wrote blob");
        out.push(SplitFile {
            kind: chunk.kind,
            path,
            len: chunk.len(),
        });
    }
    info!(files = out.len(), dir = %out_dir.display(), "split archive");
    Ok(out)
}

fn read_blob<S: ByteSource + ?Sized>(source: &S, chunk: &ChunkEntry) -> Result<Vec<u8>> {
    let len = usize::try_from(chunk.len()).map_err(|_| FormatError::OutOfBounds {
        offset: chunk.start,
        len: chunk.len(),
        size: source.len(),
    })?;
    source.read_vec(chunk.start, len)
}

fn unique_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name.as_str(), ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Decode every wave of the wave system in `wave_system` to
/// `<waves_dir>/<archive>_<slot>.wav`.
///
/// Every wave archive the system names must exist in `waves_dir`; the
/// first missing one aborts the run. Files written before that stay.
pub fn extract_waves<S: ByteSource>(wave_system: S, waves_dir: &Path) -> Result<Vec<PathBuf>> {
    let bank = SampleBank::new(wave_system)?;
    let mut written = Vec::new();
    for archive in bank.wave_archives()? {
        let archive_path = waves_dir.join(archive.name.as_str());
        if !archive_path.is_file() {
            return Err(FormatError::MissingExternalResource { path: archive_path });
        }
        let aw = FileSource::open(&archive_path)?;
        debug!(archive = %archive.name, waves = archive.waves.len(), "extracting wave archive");

        for wave in &archive.waves {
            let compressed = aw.read_vec(wave.source_offset as u64, wave.source_length as usize)?;
            let pcm = adpcm::decode(&compressed);
            let path = waves_dir.join(staged_file_name(archive.name.as_str(), wave.slot));
            write_wav_mono16(&path, &pcm, wave.sample_rate)?;
            written.push(path);
        }
    }
    info!(waves = written.len(), dir = %waves_dir.display(), "extracted waves");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_kind() {
        assert_eq!(split_file_name("Z2Sound", ChunkKind::SoundTable), "Z2Sound.bst");
        assert_eq!(
            split_file_name("Z2Sound", ChunkKind::WaveSystem { id: 3 }),
            "Z2Sound.3.wsys"
        );
        assert_eq!(
            split_file_name("Z2Sound", ChunkKind::InstrumentBank { id: 12, wave_system: 3 }),
            "Z2Sound.12.bnk"
        );
    }

    #[test]
    fn repeated_names_get_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "a.rarc".into()), "a.rarc");
        assert_eq!(unique_name(&mut taken, "a.rarc".into()), "a_1.rarc");
        assert_eq!(unique_name(&mut taken, "a.rarc".into()), "a_2.rarc");
        assert_eq!(unique_name(&mut taken, "plain".into()), "plain");
        assert_eq!(unique_name(&mut taken, "plain".into()), "plain_1");
    }
}
