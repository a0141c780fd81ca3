//! End-to-end scenarios across the workspace crates.

use std::path::Path;

use ja_engine::{resolve_loop, PlayerCommand, PlayerConfig, SequencePlayer};
use ja_formats::fixture::{self, ArchiveBuilder, InstrumentDef, WaveDef};
use ja_formats::sequence::opcode::*;
use ja_formats::sequence::{decode_varint, encode_varint};
use ja_formats::{
    adpcm, read_chunks, tags, AdpcmHistory, Archive, Bms, ByteWriter, FormatError, WaveDirectory,
};
use ja_ir::{EventList, EventPayload};
use pretty_assertions::assert_eq;

fn stage_wav(dir: &Path, name: &str, samples: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 32000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(dir.join(name), spec).unwrap();
    for i in 0..samples {
        w.write_sample((i as i16).wrapping_mul(31)).unwrap();
    }
    w.finalize().unwrap();
}

fn one_sample_archive(wave: WaveDef) -> Vec<u8> {
    let wsys = fixture::wave_system("Scenario_0.aw", &[wave]);
    let bank = fixture::instrument_bank(
        1,
        &[InstrumentDef::Melodic {
            entries: vec![(127, 5, 1.0)],
            multiplier: 1.0,
        }],
    );
    ArchiveBuilder::new()
        .wave_system(0, wsys)
        .instrument_bank(0, bank)
        .build()
}

// ---------------------------------------------------------------------------
// Archive -> instrument -> sample
// ---------------------------------------------------------------------------

#[test]
fn non_looping_sample_keeps_staged_length() {
    let dir = tempfile::tempdir().unwrap();
    stage_wav(dir.path(), "Scenario_0.aw_00000000.wav", 300);

    let archive = Archive::from_bytes(one_sample_archive(WaveDef::new(5, 60))).unwrap();
    let bank = archive.instrument_bank(1).unwrap();
    let inst = bank.instrument(0).unwrap();
    let entry = inst.entry_for_key(100).unwrap();
    assert_eq!(entry.key_limit, 127);
    assert_eq!(entry.sample_id, 5);

    let wsys = archive.wave_system(bank.wave_system()).unwrap();
    let sample = wsys.sample(entry.sample_id, &WaveDirectory::new(dir.path())).unwrap();
    assert_eq!(sample.root_key, 60);
    assert!(!sample.is_looping);
    assert_eq!(sample.data.len(), 600);
    assert_eq!(sample.bits_per_sample, 16);
    assert_eq!(sample.channels, 1);
}

#[test]
fn looping_sample_is_cut_at_loop_end() {
    let dir = tempfile::tempdir().unwrap();
    stage_wav(dir.path(), "Scenario_0.aw_00000000.wav", 1000);

    let wave = WaveDef::new(5, 60).looping(20, 100);
    let archive = Archive::from_bytes(one_sample_archive(wave)).unwrap();
    let wsys = archive.wave_system(0).unwrap();
    let sample = wsys.sample(5, &WaveDirectory::new(dir.path())).unwrap();
    assert!(sample.is_looping);
    assert_eq!(sample.loop_start, 20);
    assert_eq!(sample.data.len(), 100 * 2);
}

#[test]
fn unknown_sample_id_is_a_lookup_miss() {
    let archive = Archive::from_bytes(one_sample_archive(WaveDef::new(5, 60))).unwrap();
    let wsys = archive.wave_system(0).unwrap();
    let err = wsys.sample(6, &WaveDirectory::new("unused")).unwrap_err();
    assert!(matches!(err, FormatError::SampleNotFound { id: 6 }));
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

#[test]
fn empty_container_has_no_chunks() {
    let mut w = ByteWriter::new();
    w.tag(tags::ARCHIVE_MAGIC).tag(tags::ARCHIVE_END);
    let data = w.into_inner();

    assert!(read_chunks(&data).unwrap().is_empty());
    let archive = Archive::from_bytes(data).unwrap();
    assert_eq!(archive.wave_systems().count(), 0);
    assert_eq!(archive.instrument_banks().count(), 0);
}

#[test]
fn unknown_tag_fails_even_after_valid_chunks() {
    let mut data = ArchiveBuilder::new()
        .range(tags::BSC, vec![0; 8])
        .rarc(fixture::rarc(16))
        .build();
    // tag of the second entry, after magic and the 12-byte bsc entry
    data[16..20].copy_from_slice(b"what");
    let err = read_chunks(&data).unwrap_err();
    match err {
        FormatError::UnknownChunk { offset, tag } => {
            assert_eq!(offset, 16);
            assert_eq!(tag.as_bytes(), b"what");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bad_magic_is_rejected() {
    let err = read_chunks(&b"RIFF>_AA".to_vec()).unwrap_err();
    assert!(matches!(err, FormatError::InvalidMagic { offset: 0, .. }));
}

// ---------------------------------------------------------------------------
// ADPCM and varints
// ---------------------------------------------------------------------------

#[test]
fn adpcm_clamps_instead_of_wrapping() {
    // shift 2^15, coefficient pair 0, nibbles +7 and -8
    let frame = [0xF0, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78];
    let (pcm, history) = adpcm::decode_frame(&frame, AdpcmHistory::default());
    assert_eq!(pcm[0], 32767);
    assert_eq!(pcm[1], -32768);
    assert!(pcm.iter().all(|&s| s == 32767 || s == -32768));
    assert_eq!(history.hist1, -32768);

    let again = adpcm::decode_frame(&frame, AdpcmHistory::default());
    assert_eq!(again, (pcm, history));
}

#[test]
fn varint_round_trips_and_flags_continuation() {
    for v in [0u32, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x12_3456, 0x0FFF_FFFF] {
        let bytes = encode_varint(v);
        let (last, rest) = bytes.split_last().unwrap();
        assert_eq!(last & 0x80, 0, "final byte of {v:#x}");
        assert!(rest.iter().all(|b| b & 0x80 != 0), "continuation bytes of {v:#x}");
        assert_eq!(decode_varint(&bytes), v);
    }
}

// ---------------------------------------------------------------------------
// Sequence loop resolution
// ---------------------------------------------------------------------------

/// Track 0 at offset 10: a note-on at 10 and a terminator at 20, with a
/// directory-level loop back to 10.
fn looping_bms() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u8(TRACK).u32(0x18).u8(TERMINATE);
    w.seek(10).u8(60).u8(0).u8(127);
    w.u8(SKIP_2_WIDE).u16(0);
    w.u8(PITCH).u8(0x05).u16(0);
    w.u8(TERMINATE);
    w.seek(0x18).u8(TRACK).u8(0).u24(10);
    w.u8(LOOP).u24(10);
    w.u8(TERMINATE);
    w.into_inner()
}

#[test]
fn directory_loop_resolves_to_note_on() {
    let seq = Bms::decode(looping_bms()).unwrap();
    let track = &seq.tracks[0];
    let offsets: Vec<_> = track.events.iter().map(|e| e.origin_offset).collect();
    assert_eq!(offsets, vec![10, 20]);

    let target = match seq.directory[..] {
        [ref e] => match e.payload {
            EventPayload::Loop { target } => target,
            ref other => panic!("expected loop, got {other:?}"),
        },
        ref other => panic!("expected one directory event, got {other:?}"),
    };
    assert_eq!(target, 10);

    let index = resolve_loop(&track.events, target).unwrap();
    assert_eq!(
        track.events[index].payload,
        EventPayload::NoteOn { key: 60, slot: 0, velocity: 127 }
    );
    let location = seq.locate(target).unwrap();
    assert_eq!(location.list, EventList::Track(0));
    assert_eq!(location.index, index);
}

#[test]
fn decoded_sequence_plays() {
    let seq = Bms::decode(looping_bms()).unwrap();
    let mut player = SequencePlayer::new(&seq, PlayerConfig::default());
    let cmds = player.step();
    assert_eq!(
        cmds,
        vec![PlayerCommand::NoteOn {
            track: 0,
            slot: 0,
            key: 60,
            velocity: 127,
            bank: 0,
            program: 0,
        }]
    );
    assert!(player.is_finished());
}
