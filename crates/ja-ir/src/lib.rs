//! Core data model for decoded JAudio sound data.
//!
//! Every decoder in `ja-formats` emits these types, and the sequence
//! player in `ja-engine` consumes them. All values are built once during
//! a decode pass and never mutated afterwards.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event;
mod instrument;
mod sample;
mod sequence;

pub use event::{EventPayload, SequenceEvent};
pub use instrument::{Instrument, InstrumentKind, SampleEntry, MAX_KEY};
pub use sample::{ArchiveName, Sample, SampleLocation, WaveInfo};
pub use sequence::{EventList, EventLocation, Sequence, Track};
