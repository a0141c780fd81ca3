//! BMS sequence decoder.
//!
//! A sequence is decoded in three phases over one byte stream:
//!
//! 1. the main header, up to its terminator, which yields the meta track
//!    and the track directory pointer
//! 2. the track directory, which lists each track's number and start offset
//! 3. every track's opcode stream
//!
//! Reference and loop-call opcodes push a return address and jump; return
//! pops. One call stack is shared by all phases. Loop opcodes only record
//! their target: the player resolves it against event origin offsets.

pub mod opcode;
mod varint;

pub use opcode::TrackByte;
pub use varint::{decode_varint, encode_varint, peek_varint, read_varint, MAX_VARINT, MAX_VARINT_BYTES};

use ja_ir::{EventPayload, Sequence, SequenceEvent, Track};
use tracing::{debug, trace, warn};

use crate::cursor::{ByteCursor, ByteSource};
use crate::error::{FormatError, Result};

use opcode::*;

/// Bounds that stop malformed sequences from looping or recursing forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Deepest allowed reference nesting
    pub max_call_depth: usize,
    /// Opcodes decoded per phase (header, directory, each track)
    pub max_steps: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_steps: 1_000_000,
        }
    }
}

/// BMS decoder state: cursor, call stack and limits.
pub struct Bms<S> {
    cursor: ByteCursor<S>,
    stack: Vec<u64>,
    limits: DecodeLimits,
}

impl<S: ByteSource> Bms<S> {
    /// Decode a whole sequence with default limits.
    pub fn decode(source: S) -> Result<Sequence> {
        Self::decode_with_limits(source, DecodeLimits::default())
    }

    pub fn decode_with_limits(source: S, limits: DecodeLimits) -> Result<Sequence> {
        let mut bms = Bms {
            cursor: ByteCursor::new(source),
            stack: Vec::new(),
            limits,
        };

        let (meta_track, directory_offset) = bms.header()?;
        let directory_offset = directory_offset.ok_or_else(|| FormatError::ChunkNotFound {
            what: "track directory pointer".to_string(),
        })?;
        let (directory, mut tracks) = bms.directory(directory_offset)?;
        for track in &mut tracks {
            track.events = bms.track(track.start_offset)?;
            debug!(
                track = track.number,
                start = track.start_offset,
                events = track.events.len(),
                "decoded track"
            );
        }

        Ok(Sequence {
            meta_track,
            directory,
            tracks,
        })
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn header(&mut self) -> Result<(Vec<SequenceEvent>, Option<u64>)> {
        let mut events = Vec::new();
        let mut directory = None;
        let mut steps = 0;
        loop {
            self.step(&mut steps)?;
            let origin = self.cursor.tell();
            let op = self.cursor.read_u8()?;
            trace!(origin, op, "header opcode");
            let payload = match op {
                TRACK => {
                    let pointer = self.cursor.read_u32()? as u64;
                    if directory.is_none() {
                        directory = Some(pointer);
                    }
                    None
                }
                ARTICULATION => match self.cursor.read_u8()? {
                    ARTICULATION_TIME_RESOLUTION => {
                        Some(EventPayload::TimeResolution(self.cursor.read_u16()?))
                    }
                    _ => {
                        self.cursor.skip(2)?;
                        None
                    }
                },
                TEMPO => Some(EventPayload::Tempo(self.cursor.read_u16()?)),
                DELAY => Some(EventPayload::Delay(read_varint(&mut self.cursor)?)),
                LOOP => Some(EventPayload::Loop {
                    target: self.cursor.read_u24()?,
                }),
                MARKER => Some(EventPayload::Marker {
                    name: self.cursor.read_null_terminated_string()?,
                }),
                REFERENCE | LOOP_CALL | RETURN => self.control_flow(op)?,
                TERMINATE => Some(EventPayload::Terminate),
                _ => match header_skip_width(op) {
                    Some(width) => {
                        self.cursor.skip(width)?;
                        None
                    }
                    None => {
                        warn!(origin, op, "ignoring unknown header opcode");
                        None
                    }
                },
            };
            if let Some(payload) = payload {
                events.push(SequenceEvent::new(origin as u32, payload));
            }
            if op == TERMINATE {
                return Ok((events, directory));
            }
        }
    }

    fn directory(&mut self, offset: u64) -> Result<(Vec<SequenceEvent>, Vec<Track>)> {
        self.cursor.seek(offset)?;
        let mut events = Vec::new();
        let mut tracks = Vec::new();
        let mut steps = 0;
        loop {
            self.step(&mut steps)?;
            let origin = self.cursor.tell();
            let op = self.cursor.read_u8()?;
            trace!(origin, op, "directory opcode");
            let payload = match op {
                TRACK => {
                    let number = self.cursor.read_u8()?;
                    let start = self.cursor.read_u24()?;
                    debug!(number, start, "track entry");
                    tracks.push(Track::new(number, start));
                    None
                }
                DELAY => Some(EventPayload::Delay(read_varint(&mut self.cursor)?)),
                LOOP => Some(EventPayload::Loop {
                    target: self.cursor.read_u24()?,
                }),
                TERMINATE => return Ok((events, tracks)),
                _ => {
                    warn!(origin, op, "ignoring unknown directory opcode");
                    None
                }
            };
            if let Some(payload) = payload {
                events.push(SequenceEvent::new(origin as u32, payload));
            }
        }
    }

    fn track(&mut self, offset: u32) -> Result<Vec<SequenceEvent>> {
        self.cursor.seek(offset as u64)?;
        let mut events = Vec::new();
        let mut steps = 0;
        loop {
            self.step(&mut steps)?;
            let origin = self.cursor.tell();
            let byte = self.cursor.read_u8()?;
            trace!(origin, byte, "track byte");
            let payload = match TrackByte::from(byte) {
                TrackByte::Note(key) => {
                    let slot = self.cursor.read_u8()?;
                    let velocity = self.cursor.read_u8()?;
                    Some(EventPayload::NoteOn { key, slot, velocity })
                }
                TrackByte::NoteOff(slot) => Some(EventPayload::NoteOff { slot }),
                TrackByte::Opcode(op) => self.track_opcode(op, origin)?,
            };
            if let Some(payload) = payload {
                let done = payload.is_terminal();
                events.push(SequenceEvent::new(origin as u32, payload));
                if done {
                    return Ok(events);
                }
            }
        }
    }

    fn track_opcode(&mut self, op: u8, origin: u64) -> Result<Option<EventPayload>> {
        if matches!(op, REFERENCE | LOOP_CALL | RETURN) {
            return self.control_flow(op);
        }
        let c = &mut self.cursor;
        let payload = match op {
            DELAY => Some(EventPayload::Delay(read_varint(c)?)),
            BANK_SELECT => Some(EventPayload::BankSelect(c.read_u8()?)),
            INSTRUMENT_CHANGE => Some(EventPayload::InstrumentChange(c.read_u8()?)),
            CONTROLLER => match c.read_u8()? {
                CONTROLLER_VOLUME => Some(EventPayload::Volume(c.read_u8()?)),
                CONTROLLER_REVERB => Some(EventPayload::Reverb(c.read_u8()?)),
                CONTROLLER_PAN => Some(EventPayload::Pan(c.read_u8()?)),
                _ => {
                    c.skip(1)?;
                    None
                }
            },
            PITCH => match c.read_u8()? {
                PITCH_BEND => Some(EventPayload::Pitch(c.read_i16()?)),
                _ => {
                    c.skip(2)?;
                    None
                }
            },
            ARTICULATION => match c.read_u8()? {
                ARTICULATION_VIBRATO => Some(EventPayload::Vibrato(c.read_u16()?)),
                _ => {
                    c.skip(2)?;
                    None
                }
            },
            LOOP => Some(EventPayload::Loop {
                target: c.read_u24()?,
            }),
            SKIP_2_WIDE => {
                c.skip(2)?;
                None
            }
            TERMINATE => Some(EventPayload::Terminate),
            _ => {
                warn!(origin, op, "ignoring unknown track opcode");
                None
            }
        };
        Ok(payload)
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    /// Handle reference, loop-call and return. The opcode byte has been read.
    fn control_flow(&mut self, op: u8) -> Result<Option<EventPayload>> {
        match op {
            REFERENCE | LOOP_CALL => {
                if op == LOOP_CALL {
                    self.cursor.skip(1)?;
                }
                let target = self.cursor.read_u24()?;
                if self.stack.len() >= self.limits.max_call_depth {
                    return Err(FormatError::StackOverflow {
                        offset: self.cursor.tell(),
                        limit: self.limits.max_call_depth,
                    });
                }
                self.stack.push(self.cursor.tell());
                self.cursor.seek(target as u64)?;
                Ok(Some(EventPayload::Call { target }))
            }
            _ => match self.stack.pop() {
                Some(back) => {
                    self.cursor.seek(back)?;
                    Ok(Some(EventPayload::Return))
                }
                None => Ok(None),
            },
        }
    }

    fn step(&self, steps: &mut usize) -> Result<()> {
        *steps += 1;
        if *steps > self.limits.max_steps {
            return Err(FormatError::UnboundedLoop {
                offset: self.cursor.tell(),
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }
}
