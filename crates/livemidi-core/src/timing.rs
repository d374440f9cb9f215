//! Timing primitives shared by the loop and event scheduling.
//!
//! All times are in milliseconds on the output's clock. Event offsets
//! (`after`, `hold`) are expressed in beats and converted with a
//! [`Timing`] snapshot taken from the loop.

/// Default tempo in beats per minute.
pub const DEFAULT_BPM: f64 = 120.0;

/// Default delay before the first position is played, in milliseconds.
pub const DEFAULT_OFFSET_MS: f64 = 100.0;

/// Lead time of the early note-off sent before a retriggered note.
pub const EARLY_OFF_MS: f64 = 10.0;

/// Milliseconds per beat at `bpm`.
///
/// The tempo is clamped to 1..=999 BPM to keep the interval finite.
pub fn interval_for(bpm: f64) -> f64 {
    60_000.0 / bpm.clamp(1.0, 999.0)
}

/// Loop timing needed to turn beat offsets into milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Milliseconds per beat.
    pub interval: f64,
    /// Beats in one bar of the form.
    pub beats_per_bar: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            interval: interval_for(DEFAULT_BPM),
            beats_per_bar: crate::form::DEFAULT_BEATS,
        }
    }
}

impl Timing {
    /// Convert a beat offset to milliseconds.
    ///
    /// Offsets up to one bar scale with the interval. Longer offsets are
    /// added to a single interval instead.
    pub fn beats_to_ms(&self, beats: f64) -> f64 {
        if beats <= self.beats_per_bar as f64 {
            self.interval * beats
        } else {
            self.interval + beats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_for() {
        assert!((interval_for(120.0) - 500.0).abs() < 1e-9);
        assert!((interval_for(60.0) - 1000.0).abs() < 1e-9);
        assert!((interval_for(0.0) - 60_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_beats_to_ms() {
        let timing = Timing {
            interval: 500.0,
            beats_per_bar: 4,
        };
        assert!((timing.beats_to_ms(0.5) - 250.0).abs() < 1e-9);
        assert!((timing.beats_to_ms(4.0) - 2000.0).abs() < 1e-9);
        // past one bar the offset is added, not multiplied
        assert!((timing.beats_to_ms(6.0) - 506.0).abs() < 1e-9);
    }
}
