//! Tick-driven sequence player.
//!
//! Every event list keeps its own cursor and the tick at which its next
//! event is due. On each tick the due lists run their events until a delay
//! or a taken loop, emitting a [`PlayerCommand`] for everything audible.

use ja_ir::{EventPayload, Sequence, SequenceEvent};
use tracing::{debug, warn};

use crate::clock::TickClock;

/// Initial playback state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Beats per minute until the sequence sets its own
    pub initial_tempo: u16,
    /// Ticks per beat until the sequence sets its own
    pub initial_ticks_per_beat: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_tempo: 120,
            initial_ticks_per_beat: 120,
        }
    }
}

/// Something the audio side has to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    /// Start `key` on voice `slot` with the instrument `(bank, program)`
    NoteOn {
        track: u8,
        slot: u8,
        key: u8,
        velocity: u8,
        bank: u8,
        program: u8,
    },
    NoteOff { track: u8, slot: u8 },
    /// Silence every voice of a track, sent before a loop jump
    AllNotesOff { track: u8 },
    Volume { track: u8, value: u8 },
    Pan { track: u8, value: u8 },
    Reverb { track: u8, value: u8 },
    Pitch { track: u8, value: i16 },
    Vibrato { track: u8, value: u16 },
    Tempo(u16),
    TimeResolution(u16),
}

/// Index of the event in `events` whose origin offset is `target`.
///
/// Plain linear scan; the first match wins.
pub fn resolve_loop(events: &[SequenceEvent], target: u32) -> Option<usize> {
    events.iter().position(|e| e.origin_offset == target)
}

/// Playback position of one event list.
#[derive(Clone, Copy, Debug, Default)]
struct ListCursor {
    index: usize,
    next_event_tick: u64,
    finished: bool,
}

/// Channel state of one track.
#[derive(Clone, Copy, Debug, Default)]
struct Channel {
    bank: u8,
    program: u8,
}

/// Plays a decoded sequence.
pub struct SequencePlayer<'a> {
    sequence: &'a Sequence,
    meta: ListCursor,
    tracks: Vec<(ListCursor, Channel)>,
    tick: u64,
    tempo: u16,
    ticks_per_beat: u16,
    clock: TickClock,
}

impl<'a> SequencePlayer<'a> {
    pub fn new(sequence: &'a Sequence, config: PlayerConfig) -> Self {
        debug!(tracks = sequence.tracks.len(), "starting sequence player");
        Self {
            sequence,
            meta: ListCursor::default(),
            tracks: vec![Default::default(); sequence.tracks.len()],
            tick: 0,
            tempo: config.initial_tempo,
            ticks_per_beat: config.initial_ticks_per_beat,
            clock: TickClock::new(),
        }
    }

    /// Ticks processed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Current `(bank, program)` of track `index`.
    pub fn instrument(&self, index: usize) -> Option<(u8, u8)> {
        self.tracks.get(index).map(|(_, ch)| (ch.bank, ch.program))
    }

    /// True once the meta track and every track hit their terminator or
    /// ran out of events.
    pub fn is_finished(&self) -> bool {
        self.meta.finished && self.tracks.iter().all(|(cursor, _)| cursor.finished)
    }

    /// Run as many ticks as `elapsed_ms` of wall time covers at the current
    /// tempo.
    pub fn advance_ms(&mut self, elapsed_ms: u32) -> Vec<PlayerCommand> {
        let ticks = self.clock.advance(elapsed_ms, self.tempo, self.ticks_per_beat);
        let mut out = Vec::new();
        for _ in 0..ticks {
            out.extend(self.step());
        }
        out
    }

    /// Process one tick and return the commands it produced.
    pub fn step(&mut self) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let now = self.tick;
        let sequence = self.sequence;

        let mut meta = self.meta;
        run_list(&sequence.meta_track, &mut meta, now, &mut |payload| {
            match *payload {
                EventPayload::Tempo(t) => {
                    self.tempo = t;
                    out.push(PlayerCommand::Tempo(t));
                }
                EventPayload::TimeResolution(r) => {
                    self.ticks_per_beat = r;
                    out.push(PlayerCommand::TimeResolution(r));
                }
                _ => {}
            }
        });
        self.meta = meta;

        for (track, (cursor, channel)) in sequence.tracks.iter().zip(self.tracks.iter_mut()) {
            let number = track.number;
            let taken = run_list(&track.events, cursor, now, &mut |payload| {
                if let Some(cmd) = apply(number, channel, payload) {
                    match cmd {
                        PlayerCommand::Tempo(t) => self.tempo = t,
                        PlayerCommand::TimeResolution(r) => self.ticks_per_beat = r,
                        _ => {}
                    }
                    out.push(cmd);
                }
            });
            if taken {
                out.push(PlayerCommand::AllNotesOff { track: number });
            }
        }

        self.tick += 1;
        out
    }
}

/// Run the due events of one list. Returns true if a loop was taken.
fn run_list(
    events: &[SequenceEvent],
    cursor: &mut ListCursor,
    now: u64,
    on_event: &mut dyn FnMut(&EventPayload),
) -> bool {
    if cursor.finished || cursor.next_event_tick != now {
        return false;
    }
    while let Some(event) = events.get(cursor.index) {
        cursor.index += 1;
        match event.payload {
            EventPayload::Delay(0) => {}
            EventPayload::Delay(ticks) => {
                cursor.next_event_tick = now + ticks as u64;
                return false;
            }
            EventPayload::Loop { target } => match resolve_loop(events, target) {
                Some(index) => {
                    cursor.index = index;
                    cursor.next_event_tick = now + 1;
                    return true;
                }
                None => warn!(target, "loop target not found in list, skipping"),
            },
            EventPayload::Terminate => {
                cursor.finished = true;
                return false;
            }
            ref payload => on_event(payload),
        }
    }
    cursor.finished = true;
    false
}

/// Update channel state for one track event and build its command.
fn apply(track: u8, channel: &mut Channel, payload: &EventPayload) -> Option<PlayerCommand> {
    let cmd = match *payload {
        EventPayload::BankSelect(bank) => {
            channel.bank = bank;
            return None;
        }
        EventPayload::InstrumentChange(program) => {
            channel.program = program;
            return None;
        }
        EventPayload::NoteOn { key, slot, velocity } => PlayerCommand::NoteOn {
            track,
            slot,
            key,
            velocity,
            bank: channel.bank,
            program: channel.program,
        },
        EventPayload::NoteOff { slot } => PlayerCommand::NoteOff { track, slot },
        EventPayload::Volume(value) => PlayerCommand::Volume { track, value },
        EventPayload::Pan(value) => PlayerCommand::Pan { track, value },
        EventPayload::Reverb(value) => PlayerCommand::Reverb { track, value },
        EventPayload::Pitch(value) => PlayerCommand::Pitch { track, value },
        EventPayload::Vibrato(value) => PlayerCommand::Vibrato { track, value },
        // Tempo inside a track still drives the global clock in BMS
        EventPayload::Tempo(t) => PlayerCommand::Tempo(t),
        EventPayload::TimeResolution(r) => PlayerCommand::TimeResolution(r),
        _ => return None,
    };
    Some(cmd)
}
