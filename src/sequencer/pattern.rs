// Pattern - Recorded sequence of pad hits
// A pattern is the single take the transport records into and plays back

use super::transport::TransportState;
use super::{SequencerError, SequencerResult};
use crate::pads::PadId;
use serde::{Deserialize, Serialize};

/// One recorded trigger, relative to pattern start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadHit {
    pub pad_id: PadId,
    pub timestamp_ms: f64,
}

impl PadHit {
    pub fn new(pad_id: PadId, timestamp_ms: f64) -> Self {
        Self {
            pad_id,
            timestamp_ms: timestamp_ms.max(0.0),
        }
    }
}

/// Recorded hits plus the loop length
///
/// Hits keep record order, not timestamp order; use [`Pattern::hits_by_time`]
/// for playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    hits: Vec<PadHit>,
    duration_ms: f64,
    #[serde(default, rename = "loop")]
    loop_enabled: bool,
}

impl Pattern {
    /// Create a new empty pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// All hits in record order
    pub fn hits(&self) -> &[PadHit] {
        &self.hits
    }

    /// Hits sorted by timestamp; equal timestamps keep record order
    pub fn hits_by_time(&self) -> Vec<PadHit> {
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        hits
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn is_loop(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Get the number of hits
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Check if pattern has no hits
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hits for one pad, in record order (timeline lanes)
    pub fn hits_for_pad(&self, pad_id: PadId) -> impl Iterator<Item = &PadHit> + '_ {
        self.hits.iter().filter(move |hit| hit.pad_id == pad_id)
    }

    /// Latest hit timestamp, 0 when empty
    pub fn last_hit_ms(&self) -> f64 {
        self.hits
            .iter()
            .map(|hit| hit.timestamp_ms)
            .fold(0.0, f64::max)
    }
}

/// Owner of the single live pattern
///
/// A pattern opened by [`PatternStore::begin_new`] is a draft until the first
/// [`PatternStore::finalize`]; only finalized patterns are playable.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    pattern: Option<Pattern>,
    finalized: bool,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any existing pattern and open an empty draft
    pub fn begin_new(&mut self, state: TransportState) -> SequencerResult<()> {
        if state == TransportState::Overdubbing {
            return Err(SequencerError::InvalidTransportState {
                command: "begin_new",
                state,
            });
        }
        self.pattern = Some(Pattern::new());
        self.finalized = false;
        Ok(())
    }

    /// Append a hit to the live pattern while recording
    pub fn append_hit(
        &mut self,
        state: TransportState,
        pad_id: PadId,
        timestamp_ms: f64,
    ) -> SequencerResult<PadHit> {
        let pattern = match (&mut self.pattern, state.is_recording()) {
            (Some(pattern), true) => pattern,
            _ => {
                return Err(SequencerError::InvalidTransportState {
                    command: "append_hit",
                    state,
                });
            }
        };

        let hit = PadHit::new(pad_id, timestamp_ms);
        pattern.hits.push(hit);
        Ok(hit)
    }

    /// Close a recording pass. Returns the resulting duration.
    ///
    /// The duration never shrinks and always covers the latest hit.
    pub fn finalize(&mut self, measured_duration_ms: f64) -> Option<f64> {
        let pattern = self.pattern.as_mut()?;
        pattern.duration_ms = pattern
            .duration_ms
            .max(measured_duration_ms.max(0.0))
            .max(pattern.last_hit_ms());
        self.finalized = true;
        Some(pattern.duration_ms)
    }

    /// Drop a draft that never got finalized (e.g. a cancelled count-in)
    pub fn discard_draft(&mut self) -> bool {
        if self.pattern.is_some() && !self.finalized {
            self.pattern = None;
            return true;
        }
        false
    }

    /// Discard the pattern entirely
    pub fn clear(&mut self, state: TransportState) -> SequencerResult<()> {
        if state != TransportState::Idle {
            return Err(SequencerError::InvalidTransportState {
                command: "clear",
                state,
            });
        }
        self.pattern = None;
        self.finalized = false;
        Ok(())
    }

    /// The playable (finalized) pattern
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref().filter(|_| self.finalized)
    }

    /// The pattern being recorded or played, draft or not
    pub fn live(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn set_loop(&mut self, enabled: bool) -> bool {
        match self.pattern.as_mut() {
            Some(pattern) => {
                pattern.set_loop(enabled);
                true
            }
            None => false,
        }
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern().is_some()
    }
}
