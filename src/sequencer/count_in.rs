// Count-in - bounded lead-in of metronome beats before recording

use super::metronome::ClickType;
use super::scheduler::{TaskAction, TaskHandle, TimerArena};
use super::{SequencerError, SequencerResult};

#[derive(Debug, Clone)]
struct CountInRun {
    beats: u32,
    beats_played: u32,
    handles: Vec<TaskHandle>,
}

/// One-shot lead-in: exactly `beats` clicks, then a single completion
#[derive(Debug, Clone, Default)]
pub struct CountIn {
    run: Option<CountInRun>,
}

impl CountIn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `beats_per_bar` clicks starting at `now_ms` and the completion
    /// one beat after the last click. A run already in progress is replaced.
    pub fn run(
        &mut self,
        timers: &mut TimerArena,
        now_ms: f64,
        beat_duration_ms: f64,
        beats_per_bar: u32,
    ) -> SequencerResult<()> {
        if !beat_duration_ms.is_finite() || beat_duration_ms <= 0.0 {
            return Err(SequencerError::InvalidConfiguration(format!(
                "count-in beat duration must be positive, got {}",
                beat_duration_ms
            )));
        }
        if beats_per_bar == 0 {
            return Err(SequencerError::InvalidConfiguration(
                "count-in needs at least one beat".to_string(),
            ));
        }
        self.cancel(timers);

        let mut handles = Vec::with_capacity(beats_per_bar as usize + 1);
        for index in 0..beats_per_bar {
            let due = now_ms + index as f64 * beat_duration_ms;
            handles.push(timers.schedule(due, TaskAction::CountInBeat { index }));
        }
        let complete_at = now_ms + beats_per_bar as f64 * beat_duration_ms;
        handles.push(timers.schedule(complete_at, TaskAction::CountInComplete));

        self.run = Some(CountInRun {
            beats: beats_per_bar,
            beats_played: 0,
            handles,
        });
        Ok(())
    }

    /// Handle a fired count-in beat
    pub fn on_beat(&mut self, index: u32) -> Option<ClickType> {
        let run = self.run.as_mut()?;
        if index >= run.beats {
            return None;
        }
        run.beats_played += 1;
        Some(ClickType::for_beat(index as u64, run.beats))
    }

    /// Handle the completion timer. Returns true exactly once per run.
    pub fn on_complete(&mut self) -> bool {
        self.run.take().is_some()
    }

    /// Cancel remaining beats; completion will never be reported
    pub fn cancel(&mut self, timers: &mut TimerArena) -> bool {
        match self.run.take() {
            Some(run) => {
                for handle in run.handles {
                    timers.cancel(handle);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Beats left before completion
    pub fn remaining_beats(&self) -> u32 {
        self.run
            .as_ref()
            .map_or(0, |run| run.beats.saturating_sub(run.beats_played))
    }
}
