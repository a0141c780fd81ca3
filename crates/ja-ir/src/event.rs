//! Decoded sequence events.

use alloc::string::String;

/// One decoded sequence event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceEvent {
    /// Byte position of the event's opcode in the sequence stream.
    /// Loop targets address events by this value.
    pub origin_offset: u32,
    /// What the event does
    pub payload: EventPayload,
}

impl SequenceEvent {
    pub fn new(origin_offset: u32, payload: EventPayload) -> Self {
        Self {
            origin_offset,
            payload,
        }
    }
}

/// What an event does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    // === Notes ===
    /// Start a note on a voice slot
    NoteOn { key: u8, slot: u8, velocity: u8 },
    /// Release the note playing on a voice slot
    NoteOff { slot: u8 },

    // === Timing ===
    /// Wait this many ticks before the next event
    Delay(u32),
    /// Ticks per beat
    TimeResolution(u16),
    /// Beats per minute
    Tempo(u16),

    // === Control flow ===
    /// Continue playback at the event whose origin offset equals `target`
    Loop { target: u32 },
    /// The decoder followed a subroutine call to `target`
    Call { target: u32 },
    /// The decoder returned from a subroutine call
    Return,
    /// End of this event list
    Terminate,

    // === Channel state ===
    BankSelect(u8),
    InstrumentChange(u8),
    Pan(u8),
    Volume(u8),
    Reverb(u8),
    /// Signed pitch bend, 682⅔ units per semitone
    Pitch(i16),
    Vibrato(u16),

    /// Named marker
    Marker { name: String },
}

impl EventPayload {
    /// Returns true for events that end the list they appear in.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventPayload::Terminate)
    }
}
