//! AFC 4-bit ADPCM.
//!
//! Each 9-byte frame holds a header byte (scale exponent in the high nibble,
//! coefficient index in the low nibble) and 16 signed 4-bit residuals. The
//! predictor uses the two previous output samples, which carry over from one
//! frame to the next.

/// Compressed frame size in bytes.
pub const FRAME_BYTES: usize = 9;
/// PCM samples produced per frame.
pub const FRAME_SAMPLES: usize = 16;

/// Predictor coefficient pairs `(c0, c1)` in 4.11 fixed point.
pub const COEFFICIENTS: [(i16, i16); 16] = [
    (0x0000, 0x0000),
    (0x0800, 0x0000),
    (0x0000, 0x0800),
    (0x0400, 0x0400),
    (0x1000, -0x0800),
    (0x0E00, -0x0600),
    (0x0C00, -0x0400),
    (0x1200, -0x0A00),
    (0x1068, -0x08C8),
    (0x12C0, -0x08FC),
    (0x1400, -0x0C00),
    (0x0800, -0x0800),
    (0x0400, -0x0400),
    (-0x0400, 0x0400),
    (-0x0400, 0x0000),
    (-0x0800, 0x0000),
];

/// The two most recent output samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdpcmHistory {
    pub hist1: i16,
    pub hist2: i16,
}

/// Decode one frame. Pure: the same frame and history always give the same
/// samples and the same new history.
pub fn decode_frame(frame: &[u8; FRAME_BYTES], history: AdpcmHistory) -> ([i16; FRAME_SAMPLES], AdpcmHistory) {
    let shift = 1i64 << (frame[0] >> 4);
    let (c0, c1) = COEFFICIENTS[(frame[0] & 0x0F) as usize];
    let AdpcmHistory { mut hist1, mut hist2 } = history;

    let mut out = [0i16; FRAME_SAMPLES];
    for (i, sample) in out.iter_mut().enumerate() {
        let byte = frame[1 + i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        let nibble = if nibble >= 8 { nibble as i64 - 16 } else { nibble as i64 };

        let mut value = (shift * nibble) << 11;
        value += hist1 as i64 * c0 as i64 + hist2 as i64 * c1 as i64;
        value >>= 11;
        let clamped = value.clamp(i16::MIN as i64, i16::MAX as i64) as i16;

        *sample = clamped;
        hist2 = hist1;
        hist1 = clamped;
    }
    (out, AdpcmHistory { hist1, hist2 })
}

/// Number of PCM samples a compressed payload decodes to.
pub fn decoded_len(compressed_len: usize) -> usize {
    compressed_len / FRAME_BYTES * FRAME_SAMPLES
}

/// Stateful decoder threading history across frames.
#[derive(Clone, Debug, Default)]
pub struct AdpcmDecoder {
    history: AdpcmHistory,
}

impl AdpcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: AdpcmHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> AdpcmHistory {
        self.history
    }

    pub fn decode_frame(&mut self, frame: &[u8; FRAME_BYTES]) -> [i16; FRAME_SAMPLES] {
        let (samples, history) = decode_frame(frame, self.history);
        self.history = history;
        samples
    }

    /// Decode every whole frame of `data`; a trailing partial frame is ignored.
    pub fn decode(&mut self, data: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(decoded_len(data.len()));
        for chunk in data.chunks_exact(FRAME_BYTES) {
            let mut frame = [0u8; FRAME_BYTES];
            frame.copy_from_slice(chunk);
            out.extend_from_slice(&self.decode_frame(&frame));
        }
        out
    }
}

/// Decode a whole payload from silence.
pub fn decode(data: &[u8]) -> Vec<i16> {
    AdpcmDecoder::new().decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_frame_stays_silent() {
        let (pcm, hist) = decode_frame(&[0; 9], AdpcmHistory::default());
        assert_eq!(pcm, [0; 16]);
        assert_eq!(hist, AdpcmHistory::default());
    }

    #[test]
    fn residuals_are_sign_extended_high_nibble_first() {
        // shift 1 << 11 cancels the >> 11, coefficient pair 0 ignores history.
        let frame = [0xB0, 0x17, 0x8F, 0, 0, 0, 0, 0, 0];
        let (pcm, hist) = decode_frame(&frame, AdpcmHistory::default());
        assert_eq!(&pcm[..4], &[1 << 11, 7 << 11, -8 << 11, -1 << 11]);
        assert_eq!(hist, AdpcmHistory { hist1: 0, hist2: 0 });
    }

    #[test]
    fn predictor_uses_history() {
        // Coefficient 1 is (1.0, 0.0): output repeats hist1 with zero residual.
        let frame = [0x01, 0, 0, 0, 0, 0, 0, 0, 0];
        let (pcm, hist) = decode_frame(&frame, AdpcmHistory { hist1: 1000, hist2: -5 });
        assert_eq!(pcm, [1000; 16]);
        assert_eq!(hist, AdpcmHistory { hist1: 1000, hist2: 1000 });
    }

    #[test]
    fn output_clamps_instead_of_wrapping() {
        let up = [0xF0, 0x77, 0, 0, 0, 0, 0, 0, 0];
        let (pcm, _) = decode_frame(&up, AdpcmHistory::default());
        assert_eq!(pcm[0], 32767);
        assert_eq!(pcm[1], 32767);

        let down = [0xF0, 0x88, 0, 0, 0, 0, 0, 0, 0];
        let (pcm, _) = decode_frame(&down, AdpcmHistory::default());
        assert_eq!(pcm[0], -32768);
        assert_eq!(pcm[1], -32768);
    }

    #[test]
    fn decoding_is_deterministic() {
        let frame = [0x48, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let history = AdpcmHistory { hist1: 1234, hist2: -4321 };
        assert_eq!(decode_frame(&frame, history), decode_frame(&frame, history));
    }

    #[test]
    fn decoder_carries_history_and_ignores_partial_frame() {
        let mut data = vec![0xB0, 0x10, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0xFF; 4]);
        let pcm = decode(&data);
        assert_eq!(pcm.len(), decoded_len(data.len()));
        assert_eq!(pcm.len(), 32);
        // Second frame predicts from the last sample of the first (0).
        assert_eq!(pcm[16..], [0; 16]);
        assert_eq!(pcm[0], 1 << 11);
    }
}
