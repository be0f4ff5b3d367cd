// Transport configuration
// One value bundles every user-facing toggle; the transport reads a copy of it
// at the start of each operation.

use super::timeline::{Tempo, TimeSignature};
use super::{SequencerError, SequencerResult};
use std::fmt;

/// Grid used to snap recorded hits
///
/// `subdivision_of_beat` is expressed in beats: 4.0 is a whole note,
/// 1.0 a quarter note, 0.25 a sixteenth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantization {
    subdivision_of_beat: f64,
    triplet: bool,
}

impl Quantization {
    pub const WHOLE: Self = Self::preset(4.0, false);
    pub const WHOLE_TRIPLET: Self = Self::preset(4.0, true);
    pub const HALF: Self = Self::preset(2.0, false);
    pub const HALF_TRIPLET: Self = Self::preset(2.0, true);
    pub const QUARTER: Self = Self::preset(1.0, false);
    pub const QUARTER_TRIPLET: Self = Self::preset(1.0, true);
    pub const EIGHTH: Self = Self::preset(0.5, false);
    pub const EIGHTH_TRIPLET: Self = Self::preset(0.5, true);
    pub const SIXTEENTH: Self = Self::preset(0.25, false);
    pub const SIXTEENTH_TRIPLET: Self = Self::preset(0.25, true);

    /// Every grid offered to the user, coarsest first
    pub const PRESETS: [Self; 10] = [
        Self::WHOLE,
        Self::WHOLE_TRIPLET,
        Self::HALF,
        Self::HALF_TRIPLET,
        Self::QUARTER,
        Self::QUARTER_TRIPLET,
        Self::EIGHTH,
        Self::EIGHTH_TRIPLET,
        Self::SIXTEENTH,
        Self::SIXTEENTH_TRIPLET,
    ];

    const fn preset(subdivision_of_beat: f64, triplet: bool) -> Self {
        Self {
            subdivision_of_beat,
            triplet,
        }
    }

    /// Create a custom grid
    pub fn new(subdivision_of_beat: f64, triplet: bool) -> SequencerResult<Self> {
        if !subdivision_of_beat.is_finite() || subdivision_of_beat <= 0.0 {
            return Err(SequencerError::InvalidConfiguration(format!(
                "subdivision must be a positive number of beats, got {}",
                subdivision_of_beat
            )));
        }
        Ok(Self::preset(subdivision_of_beat, triplet))
    }

    pub fn subdivision_of_beat(&self) -> f64 {
        self.subdivision_of_beat
    }

    pub fn is_triplet(&self) -> bool {
        self.triplet
    }

    /// Length of one grid step in milliseconds at the given tempo
    pub fn note_duration_ms(&self, beat_duration_ms: f64) -> f64 {
        let note = beat_duration_ms * self.subdivision_of_beat;
        if self.triplet { note * 2.0 / 3.0 } else { note }
    }

    /// Human readable name, e.g. "16th Note Triplet"
    pub fn label(&self) -> String {
        let base = match self.subdivision_of_beat {
            s if s == 4.0 => "Whole Note".to_string(),
            s if s == 2.0 => "Half Note".to_string(),
            s if s == 1.0 => "Quarter Note".to_string(),
            s if s == 0.5 => "8th Note".to_string(),
            s if s == 0.25 => "16th Note".to_string(),
            s => format!("{} Beat", s),
        };
        if self.triplet {
            format!("{} Triplet", base)
        } else {
            base
        }
    }
}

impl Default for Quantization {
    fn default() -> Self {
        Self::SIXTEENTH
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Snapshot of every transport setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportConfig {
    pub tempo: Tempo,
    pub time_signature: TimeSignature,
    /// Length of the visible timeline in bars
    pub measures: u8,
    /// `None` records raw timestamps
    pub quantization: Option<Quantization>,
    pub looping: bool,
    pub metronome: bool,
    pub count_in: bool,
}

impl TransportConfig {
    pub const MIN_MEASURES: u8 = 1;
    pub const MAX_MEASURES: u8 = 8;

    /// Length of the visible timeline in milliseconds
    pub fn measures_duration_ms(&self) -> f64 {
        self.tempo.bar_duration_ms(&self.time_signature) * self.measures as f64
    }

    /// Returns a copy with `measures` clamped into the supported range
    pub fn with_measures(mut self, measures: u8) -> Self {
        self.measures = measures.clamp(Self::MIN_MEASURES, Self::MAX_MEASURES);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            time_signature: TimeSignature::default(),
            measures: 4,
            quantization: Some(Quantization::default()),
            looping: false,
            metronome: true,
            count_in: false,
        }
    }
}
