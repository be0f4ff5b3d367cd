// Timeline - Musical time representation
// Handles conversion between milliseconds, beats and bars

use super::{SequencerError, SequencerResult};
use std::fmt;

/// Time signature (numerator/denominator)
///
/// Only built through [`TimeSignature::new`] or the presets, so the numerator
/// is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    numerator: u8,   // Beats per bar
    denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    pub fn new(numerator: u8, denominator: u8) -> SequencerResult<Self> {
        if numerator == 0 {
            return Err(SequencerError::InvalidConfiguration(
                "time signature numerator must be > 0".to_string(),
            ));
        }
        if !denominator.is_power_of_two() {
            return Err(SequencerError::InvalidConfiguration(format!(
                "time signature denominator must be a power of 2, got {}",
                denominator
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Common 4/4 time signature
    pub const fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }

    /// Common 3/4 time signature (waltz)
    pub const fn three_four() -> Self {
        Self {
            numerator: 3,
            denominator: 4,
        }
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    /// Number of beats per bar
    pub fn beats_per_bar(&self) -> u32 {
        self.numerator as u32
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Slowest tempo the transport accepts (values below are clamped)
    pub const MIN_BPM: f64 = 40.0;
    /// Fastest tempo the transport accepts (values above are clamped)
    pub const MAX_BPM: f64 = 240.0;

    /// Creates a new tempo
    ///
    /// Non-positive or non-finite values are rejected; anything else is
    /// clamped into [`Tempo::MIN_BPM`, `Tempo::MAX_BPM`].
    pub fn new(bpm: f64) -> SequencerResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SequencerError::InvalidConfiguration(format!(
                "BPM must be a positive number, got {}",
                bpm
            )));
        }
        Ok(Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in milliseconds
    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// Duration of one bar in milliseconds at given time signature
    pub fn bar_duration_ms(&self, time_signature: &TimeSignature) -> f64 {
        self.beat_duration_ms() * time_signature.beats_per_bar() as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Bar/beat counter as shown in the transport display (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BarBeat {
    pub bar: u32,
    pub beat: u32,
}

impl BarBeat {
    /// Bar 1, beat 1
    pub fn zero() -> Self {
        Self { bar: 1, beat: 1 }
    }

    /// Convert an elapsed time into bar/beat counters
    pub fn from_ms(elapsed_ms: f64, tempo: &Tempo, time_signature: &TimeSignature) -> Self {
        if elapsed_ms <= 0.0 {
            return Self::zero();
        }

        let total_beats = (elapsed_ms / tempo.beat_duration_ms()).floor() as u64;
        let beats_per_bar = time_signature.beats_per_bar().max(1) as u64;

        Self {
            bar: (total_beats / beats_per_bar) as u32 + 1,
            beat: (total_beats % beats_per_bar) as u32 + 1,
        }
    }
}

impl Default for BarBeat {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for BarBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.bar, self.beat)
    }
}
