//! Pitch-to-frequency-ratio conversion for sample playback.
//!
//! Ratios are relative to the sample's native rate: 1.0 plays the sample
//! at its recorded pitch, 2.0 an octave up.

/// Pitch units per semitone in BMS pitch events (682⅔).
pub const PITCH_UNITS_PER_SEMITONE: f32 = 682.0 + 2.0 / 3.0;

/// Frequency ratio for a shift of `semitones` in 12-TET.
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    libm::powf(2.0, semitones / 12.0)
}

/// Semitone offset for a signed pitch-bend value.
pub fn pitch_bend_semitones(pitch: i16) -> f32 {
    pitch as f32 / PITCH_UNITS_PER_SEMITONE
}

/// Frequency ratio for playing `key` on a sample recorded at `root_key`.
///
/// Percussion samples always play at their root pitch; only the
/// multipliers apply.
pub fn note_frequency_ratio(
    key: u8,
    root_key: u8,
    entry_multiplier: f32,
    instrument_multiplier: f32,
    percussion: bool,
) -> f32 {
    let semitones = if percussion {
        0.0
    } else {
        key as f32 - root_key as f32
    };
    semitones_to_ratio(semitones) * entry_multiplier * instrument_multiplier
}
