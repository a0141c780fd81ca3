//! Split and wave extraction against synthetic archives on disk.

use ja_formats::fixture::{self, ArchiveBuilder, InstrumentDef, WaveDef};
use ja_formats::{tags, Archive, ChunkKind, FormatError, SampleBank, WaveDirectory};
use ja_master::{extract_waves, split_archive, Controller};
use pretty_assertions::assert_eq;

/// Shift 1, coefficient pair 0: every nibble decodes to itself.
const FRAME: [u8; 9] = [0x00, 0x12, 0x34, 0x56, 0x7F, 0xE0, 0x00, 0x00, 0x00];

fn wave_system() -> Vec<u8> {
    fixture::wave_system(
        "Test_0.aw",
        &[
            WaveDef::new(1, 60).source(0, 18),
            WaveDef::new(2, 48).source(18, 9).looping(0, 4),
        ],
    )
}

fn archive() -> Vec<u8> {
    let bank = fixture::instrument_bank(
        7,
        &[InstrumentDef::Melodic {
            entries: vec![(127, 2, 1.0)],
            multiplier: 1.0,
        }],
    );
    ArchiveBuilder::new()
        .range(tags::BST, vec![1; 12])
        .range(tags::BSTN, vec![2; 4])
        .wave_system(0, wave_system())
        .instrument_bank(0, bank)
        .rarc(fixture::rarc(0x20))
        .rarc(fixture::rarc(0x40))
        .build()
}

#[test]
fn split_writes_every_blob() {
    let dir = tempfile::tempdir().unwrap();
    let data = archive();
    let files = split_archive(data.as_slice(), dir.path(), "Z2Sound").unwrap();

    let names: Vec<_> = files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "Z2Sound.bst",
            "Z2Sound.bstn",
            "Z2Sound.0.wsys",
            "Z2Sound.7.bnk",
            "Z2Sound.rarc",
            "Z2Sound_1.rarc",
        ]
    );

    assert_eq!(std::fs::read(&files[0].path).unwrap(), vec![1; 12]);
    assert_eq!(std::fs::read(&files[2].path).unwrap(), wave_system());
    assert_eq!(std::fs::read(&files[5].path).unwrap().len(), 0x40);
    assert_eq!(files[3].kind, ChunkKind::InstrumentBank { id: 7, wave_system: 0 });
}

#[test]
fn split_rejects_unknown_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = archive();
    data[4..8].copy_from_slice(b"zzzz");
    let err = split_archive(data.as_slice(), dir.path(), "bad").unwrap_err();
    assert!(matches!(err, FormatError::UnknownChunk { .. }));
    assert!(err.to_string().contains("zzzz"));
}

#[test]
fn extract_decodes_every_wave() {
    let dir = tempfile::tempdir().unwrap();
    let mut aw = Vec::new();
    aw.extend_from_slice(&FRAME);
    aw.extend_from_slice(&FRAME);
    aw.extend_from_slice(&FRAME);
    std::fs::write(dir.path().join("Test_0.aw"), &aw).unwrap();

    let written = extract_waves(wave_system(), dir.path()).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("Test_0.aw_00000000.wav"));
    assert!(written[1].ends_with("Test_0.aw_00000001.wav"));

    let mut reader = hound::WavReader::open(&written[0]).unwrap();
    assert_eq!(reader.spec().sample_rate, 32000);
    assert_eq!(reader.spec().channels, 1);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 32);
    assert_eq!(&samples[..10], &[1, 2, 3, 4, 5, 6, 7, -1, -2, 0]);

    // the staged files feed straight back into sample resolution
    let bank = SampleBank::new(wave_system()).unwrap();
    let sample = bank.sample(2, &WaveDirectory::new(dir.path())).unwrap();
    assert_eq!(sample.root_key, 48);
    assert_eq!(sample.data.len(), 8);
}

#[test]
fn extract_aborts_on_missing_archive() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_waves(wave_system(), dir.path()).unwrap_err();
    match err {
        FormatError::MissingExternalResource { path } => assert!(path.ends_with("Test_0.aw")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn controller_plays_from_extracted_waves() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Test_0.aw"), FRAME.repeat(3)).unwrap();
    extract_waves(wave_system(), dir.path()).unwrap();

    let archive_path = dir.path().join("Z2Sound.baa");
    std::fs::write(&archive_path, archive()).unwrap();
    let mut controller = Controller::open(&archive_path, dir.path()).unwrap();
    assert_eq!(controller.archive().chunks().len(), 6);

    let note = controller.resolve_note(7, 0, 60).unwrap().unwrap();
    assert_eq!(note.entry.sample_id, 2);
    assert!((note.frequency_ratio - 2.0).abs() < 1e-4);
    assert_eq!(note.sample.data.len(), 8);

    let opened = Archive::open_file(&archive_path).unwrap();
    assert!(opened.instrument_bank(7).is_some());
}
