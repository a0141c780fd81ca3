//! Sequence playback for decoded JAudio sequences.
//!
//! Walks the meta track and every track of a [`ja_ir::Sequence`] tick by
//! tick and emits [`PlayerCommand`]s. Producing audio from those commands
//! is left to the caller.

mod clock;
mod frequency;
mod player;

pub use clock::TickClock;
pub use frequency::{note_frequency_ratio, pitch_bend_semitones, semitones_to_ratio};
pub use player::{resolve_loop, PlayerCommand, PlayerConfig, SequencePlayer};
