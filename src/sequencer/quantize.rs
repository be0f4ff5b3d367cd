// Quantizer - snaps raw hit times onto the musical grid

use super::config::Quantization;
use super::{SequencerError, SequencerResult};

/// Snap `raw_ms` to the nearest grid line for the given tempo and grid
///
/// The grid step is `60000 / bpm * subdivision_of_beat`, compressed by 2/3
/// for triplets. Halfway values round away from zero.
pub fn quantize(raw_ms: f64, bpm: f64, quantization: Quantization) -> SequencerResult<f64> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(SequencerError::InvalidConfiguration(format!(
            "cannot quantize at {} BPM",
            bpm
        )));
    }
    if quantization.subdivision_of_beat() <= 0.0 {
        return Err(SequencerError::InvalidConfiguration(format!(
            "cannot quantize to a subdivision of {} beats",
            quantization.subdivision_of_beat()
        )));
    }

    let beat_duration_ms = 60_000.0 / bpm;
    let note_duration_ms = quantization.note_duration_ms(beat_duration_ms);

    Ok((raw_ms / note_duration_ms).round() * note_duration_ms)
}
