//! Wall-clock to sequence-tick conversion.

/// Converts elapsed milliseconds into whole sequence ticks.
///
/// Fractional ticks carry over between calls so that a timer firing at a
/// fixed period never drifts from the tempo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickClock {
    /// Remainder in tick-microseconds
    fractional: i64,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole ticks elapsed over `elapsed_ms` at `tempo` BPM and
    /// `ticks_per_beat`.
    pub fn advance(&mut self, elapsed_ms: u32, tempo: u16, ticks_per_beat: u16) -> u32 {
        if tempo == 0 {
            return 0;
        }
        let period = 1000 * ticks_per_beat as i64 * elapsed_ms as i64;
        let micros_per_beat = 60_000_000 / tempo as i64;
        let ticks = (self.fractional + period) / micros_per_beat;
        self.fractional += period - ticks * micros_per_beat;
        ticks as u32
    }

    /// Drop any carried remainder.
    pub fn reset(&mut self) {
        self.fractional = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_at_default_tempo() {
        let mut clock = TickClock::new();
        let total: u32 = (0..1000).map(|_| clock.advance(1, 120, 120)).sum();
        assert_eq!(total, 240);
    }

    #[test]
    fn remainder_carries() {
        let mut clock = TickClock::new();
        // 120 BPM, 120 tpb: 240 ticks/s, one tick per 4.1666 ms
        assert_eq!(clock.advance(5, 120, 120), 1);
        assert_eq!(clock.advance(5, 120, 120), 1);
        assert_eq!(clock.advance(5, 120, 120), 1);
        assert_eq!(clock.advance(5, 120, 120), 1);
        assert_eq!(clock.advance(5, 120, 120), 2);
    }

    #[test]
    fn zero_tempo_produces_no_ticks() {
        let mut clock = TickClock::new();
        assert_eq!(clock.advance(1000, 0, 120), 0);
    }

    #[test]
    fn reset_drops_remainder() {
        let mut clock = TickClock::new();
        clock.advance(3, 120, 120);
        clock.reset();
        assert_eq!(clock, TickClock::new());
    }
}
