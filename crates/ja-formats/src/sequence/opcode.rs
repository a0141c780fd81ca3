//! BMS opcode bytes.

pub const NOP: u8 = 0x00;
/// Highest byte that is a note pitch rather than an opcode.
pub const NOTE_MAX: u8 = 0x80;
pub const NOTE_OFF_MIN: u8 = 0x81;
pub const NOTE_OFF_MAX: u8 = 0x8F;

pub const CONTROLLER: u8 = 0xB8;
pub const PITCH: u8 = 0xB9;
/// Header: track directory pointer. Directory: track entry.
pub const TRACK: u8 = 0xC1;
pub const SKIP_1: u8 = 0xC2;
pub const REFERENCE: u8 = 0xC3;
pub const LOOP_CALL: u8 = 0xC4;
pub const RETURN: u8 = 0xC5;
pub const LOOP: u8 = 0xC7;
pub const ARTICULATION: u8 = 0xD8;
pub const TEMPO: u8 = 0xE0;
pub const BANK_SELECT: u8 = 0xE2;
pub const INSTRUMENT_CHANGE: u8 = 0xE3;
pub const DELAY: u8 = 0xF0;
pub const SKIP_2_WIDE: u8 = 0xF9;
pub const MARKER: u8 = 0xFD;
pub const TERMINATE: u8 = 0xFF;

// Sub-codes
pub const CONTROLLER_VOLUME: u8 = 0x00;
pub const CONTROLLER_REVERB: u8 = 0x02;
pub const CONTROLLER_PAN: u8 = 0x03;
pub const PITCH_BEND: u8 = 0x01;
pub const ARTICULATION_TIME_RESOLUTION: u8 = 0x62;
pub const ARTICULATION_VIBRATO: u8 = 0x6E;

/// Operand width of header opcodes that carry data nobody reads.
pub fn header_skip_width(op: u8) -> Option<u64> {
    match op {
        NOP => Some(0),
        SKIP_1 => Some(1),
        CONTROLLER | 0xD0 | 0xD1 | 0xD5 | SKIP_2_WIDE => Some(2),
        0xD9 => Some(3),
        0xC8 | 0xDA => Some(4),
        _ => None,
    }
}

/// How a track byte is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackByte {
    /// Implicit note-on with this pitch
    Note(u8),
    /// Note-off for this voice slot
    NoteOff(u8),
    Opcode(u8),
}

impl From<u8> for TrackByte {
    fn from(b: u8) -> Self {
        match b {
            0..=NOTE_MAX => TrackByte::Note(b),
            NOTE_OFF_MIN..=NOTE_OFF_MAX => TrackByte::NoteOff(b & 0x0F),
            _ => TrackByte::Opcode(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_byte_ranges() {
        assert_eq!(TrackByte::from(0x00), TrackByte::Note(0));
        assert_eq!(TrackByte::from(0x80), TrackByte::Note(0x80));
        assert_eq!(TrackByte::from(0x81), TrackByte::NoteOff(1));
        assert_eq!(TrackByte::from(0x8F), TrackByte::NoteOff(0xF));
        assert_eq!(TrackByte::from(0x90), TrackByte::Opcode(0x90));
        assert_eq!(TrackByte::from(TERMINATE), TrackByte::Opcode(0xFF));
    }

    #[test]
    fn header_widths() {
        assert_eq!(header_skip_width(NOP), Some(0));
        assert_eq!(header_skip_width(0xD9), Some(3));
        assert_eq!(header_skip_width(0xDA), Some(4));
        assert_eq!(header_skip_width(TEMPO), None);
    }
}
