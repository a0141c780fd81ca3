//! Decoded sequence structure: meta track, track directory and tracks.

use alloc::vec::Vec;

use crate::event::{EventPayload, SequenceEvent};

/// One playable track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Track {
    /// Track number from the directory entry
    pub number: u8,
    /// Absolute offset of the track's first opcode
    pub start_offset: u32,
    /// Decoded events in stream order
    pub events: Vec<SequenceEvent>,
}

impl Track {
    pub fn new(number: u8, start_offset: u32) -> Self {
        Self {
            number,
            start_offset,
            events: Vec::new(),
        }
    }

    /// Index of the event whose origin offset is `offset`.
    pub fn position_of(&self, offset: u32) -> Option<usize> {
        position_of(&self.events, offset)
    }
}

/// Which event list of a [`Sequence`] an event lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventList {
    Meta,
    Directory,
    /// Index into [`Sequence::tracks`]
    Track(usize),
}

/// Address of one event inside a [`Sequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventLocation {
    pub list: EventList,
    pub index: usize,
}

/// A fully decoded sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    /// Events from the main header
    pub meta_track: Vec<SequenceEvent>,
    /// Events from the track directory
    pub directory: Vec<SequenceEvent>,
    /// Tracks in directory order
    pub tracks: Vec<Track>,
}

impl Sequence {
    /// Event list selected by `list`, if it exists.
    pub fn events(&self, list: EventList) -> Option<&[SequenceEvent]> {
        match list {
            EventList::Meta => Some(&self.meta_track),
            EventList::Directory => Some(&self.directory),
            EventList::Track(i) => self.tracks.get(i).map(|t| t.events.as_slice()),
        }
    }

    /// Find the event whose opcode sits at `offset`.
    ///
    /// Searches tracks first, then the directory, then the meta track. A
    /// subroutine shared by several lists resolves to the first track that
    /// decoded it.
    pub fn locate(&self, offset: u32) -> Option<EventLocation> {
        for (i, track) in self.tracks.iter().enumerate() {
            if let Some(index) = track.position_of(offset) {
                return Some(EventLocation { list: EventList::Track(i), index });
            }
        }
        if let Some(index) = position_of(&self.directory, offset) {
            return Some(EventLocation { list: EventList::Directory, index });
        }
        position_of(&self.meta_track, offset).map(|index| EventLocation {
            list: EventList::Meta,
            index,
        })
    }

    /// The event at `location`.
    pub fn event(&self, location: EventLocation) -> Option<&SequenceEvent> {
        self.events(location.list)?.get(location.index)
    }

    /// All `(bank, program)` pairs selected anywhere in the sequence, in
    /// first-seen order.
    ///
    /// Bank and program are tracked per list; a program change pairs with the
    /// most recent bank select of the same list (bank 0 before any select).
    pub fn instrument_selections(&self) -> Vec<(u8, u8)> {
        let mut out = Vec::new();
        let lists = core::iter::once(self.meta_track.as_slice())
            .chain(core::iter::once(self.directory.as_slice()))
            .chain(self.tracks.iter().map(|t| t.events.as_slice()));
        for events in lists {
            let mut bank = 0u8;
            for event in events {
                match event.payload {
                    EventPayload::BankSelect(b) => bank = b,
                    EventPayload::InstrumentChange(p) => {
                        if !out.contains(&(bank, p)) {
                            out.push((bank, p));
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

fn position_of(events: &[SequenceEvent], offset: u32) -> Option<usize> {
    events.iter().position(|e| e.origin_offset == offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(offset: u32, payload: EventPayload) -> SequenceEvent {
        SequenceEvent::new(offset, payload)
    }

    fn two_event_track() -> Track {
        let mut track = Track::new(0, 10);
        track.events = vec![
            ev(10, EventPayload::NoteOn { key: 60, slot: 1, velocity: 100 }),
            ev(20, EventPayload::Terminate),
        ];
        track
    }

    #[test]
    fn position_of_matches_exact_offset() {
        let track = two_event_track();
        assert_eq!(track.position_of(10), Some(0));
        assert_eq!(track.position_of(20), Some(1));
        assert_eq!(track.position_of(11), None);
    }

    #[test]
    fn locate_prefers_tracks() {
        let seq = Sequence {
            meta_track: vec![ev(10, EventPayload::Tempo(120))],
            directory: vec![ev(30, EventPayload::Loop { target: 10 })],
            tracks: vec![two_event_track()],
        };
        let loc = seq.locate(10).unwrap();
        assert_eq!(loc, EventLocation { list: EventList::Track(0), index: 0 });
        assert!(matches!(
            seq.event(loc).unwrap().payload,
            EventPayload::NoteOn { key: 60, .. }
        ));
        assert_eq!(
            seq.locate(30),
            Some(EventLocation { list: EventList::Directory, index: 0 })
        );
        assert_eq!(seq.locate(99), None);
    }

    #[test]
    fn instrument_selections_pair_program_with_bank() {
        let mut track = Track::new(0, 0);
        track.events = vec![
            ev(0, EventPayload::InstrumentChange(4)),
            ev(2, EventPayload::BankSelect(3)),
            ev(4, EventPayload::InstrumentChange(7)),
            ev(6, EventPayload::InstrumentChange(7)),
        ];
        let seq = Sequence { tracks: vec![track], ..Default::default() };
        assert_eq!(seq.instrument_selections(), vec![(0, 4), (3, 7)]);
    }
}
