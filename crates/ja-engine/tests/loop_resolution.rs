//! Loop targets resolved against decoded event lists.

use ja_engine::{resolve_loop, PlayerCommand, PlayerConfig, SequencePlayer};
use ja_ir::{EventList, EventPayload, Sequence, SequenceEvent, Track};

fn ev(offset: u32, payload: EventPayload) -> SequenceEvent {
    SequenceEvent::new(offset, payload)
}

fn looped_sequence() -> Sequence {
    let mut track = Track::new(0, 10);
    track.events = vec![
        ev(10, EventPayload::NoteOn { key: 60, slot: 0, velocity: 127 }),
        ev(20, EventPayload::Terminate),
    ];
    Sequence {
        meta_track: vec![ev(0, EventPayload::Terminate)],
        directory: vec![
            ev(4, EventPayload::Delay(8)),
            ev(6, EventPayload::Loop { target: 10 }),
        ],
        tracks: vec![track],
    }
}

#[test]
fn directory_loop_lands_on_note_on() {
    let seq = looped_sequence();
    let target = match seq.directory[1].payload {
        EventPayload::Loop { target } => target,
        ref other => panic!("expected loop, got {other:?}"),
    };

    let location = seq.locate(target).unwrap();
    assert_eq!(location.list, EventList::Track(0));
    assert_eq!(location.index, 0);
    assert!(matches!(
        seq.event(location).unwrap().payload,
        EventPayload::NoteOn { key: 60, .. }
    ));

    let index = resolve_loop(&seq.tracks[0].events, target).unwrap();
    assert_eq!(seq.tracks[0].events[index].origin_offset, 10);
}

#[test]
fn neighbouring_offsets_do_not_match() {
    let seq = looped_sequence();
    assert_eq!(resolve_loop(&seq.tracks[0].events, 9), None);
    assert_eq!(resolve_loop(&seq.tracks[0].events, 11), None);
}

#[test]
fn player_finishes_single_note_track() {
    let seq = looped_sequence();
    let mut player = SequencePlayer::new(&seq, PlayerConfig::default());
    let cmds = player.step();
    assert_eq!(cmds.len(), 1);
    assert!(matches!(cmds[0], PlayerCommand::NoteOn { track: 0, key: 60, .. }));
    assert!(player.is_finished());
}
