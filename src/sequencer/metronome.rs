// Metronome - Click track scheduler for musical timing
// Emits accented/regular clicks at fixed beat intervals through the timer arena

use super::scheduler::{TaskAction, TaskHandle, TimerArena};
use super::{SequencerError, SequencerResult};

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// Click on first beat of bar (accent/downbeat)
    Accent,
    /// Click on other beats
    Regular,
}

impl ClickType {
    /// Click for the `beat_index`-th beat of a run (0-based)
    pub fn for_beat(beat_index: u64, beats_per_bar: u32) -> Self {
        if beat_index % beats_per_bar.max(1) as u64 == 0 {
            ClickType::Accent
        } else {
            ClickType::Regular
        }
    }

    pub fn is_accent(&self) -> bool {
        matches!(self, ClickType::Accent)
    }
}

/// Active metronome run
#[derive(Debug, Clone)]
struct MetronomeRun {
    origin_ms: f64,
    beat_duration_ms: f64,
    next_beat: u64,
    pending: TaskHandle,
}

/// Metronome state
///
/// Beats are scheduled one at a time at `origin + index * beat_duration`, so
/// late polling never accumulates drift.
#[derive(Debug, Clone)]
pub struct Metronome {
    beats_per_bar: u32,
    run: Option<MetronomeRun>,
}

impl Metronome {
    /// Create new metronome with one bar = 4 beats
    pub fn new() -> Self {
        Self::with_beats_per_bar(4)
    }

    pub fn with_beats_per_bar(beats_per_bar: u32) -> Self {
        Self {
            beats_per_bar: beats_per_bar.max(1),
            run: None,
        }
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Start clicking; beat 0 is due immediately at `now_ms`.
    ///
    /// Returns `Ok(false)` without touching the running click if already started.
    pub fn start(
        &mut self,
        timers: &mut TimerArena,
        now_ms: f64,
        beat_duration_ms: f64,
    ) -> SequencerResult<bool> {
        if !beat_duration_ms.is_finite() || beat_duration_ms <= 0.0 {
            return Err(SequencerError::InvalidConfiguration(format!(
                "metronome beat duration must be positive, got {}",
                beat_duration_ms
            )));
        }
        if self.run.is_some() {
            return Ok(false);
        }

        let pending = timers.schedule(now_ms, TaskAction::MetronomeTick { beat_index: 0 });
        self.run = Some(MetronomeRun {
            origin_ms: now_ms,
            beat_duration_ms,
            next_beat: 0,
            pending,
        });
        log::debug!("metronome started, {:.2}ms per beat", beat_duration_ms);
        Ok(true)
    }

    /// Stop clicking. Calling it while stopped is a no-op.
    pub fn stop(&mut self, timers: &mut TimerArena) -> bool {
        match self.run.take() {
            Some(run) => {
                timers.cancel(run.pending);
                log::debug!("metronome stopped after {} beats", run.next_beat);
                true
            }
            None => false,
        }
    }

    /// Check if metronome is running
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Number of beats emitted by the current run
    pub fn beats_emitted(&self) -> u64 {
        self.run.as_ref().map_or(0, |run| run.next_beat)
    }

    /// Handle a fired tick: returns the click to play and schedules the next one.
    ///
    /// Ticks that do not belong to the current run are ignored.
    pub fn on_tick(&mut self, timers: &mut TimerArena, beat_index: u64) -> Option<ClickType> {
        let beats_per_bar = self.beats_per_bar;
        let run = self.run.as_mut()?;
        if beat_index != run.next_beat {
            return None;
        }

        run.next_beat += 1;
        let due = run.origin_ms + run.next_beat as f64 * run.beat_duration_ms;
        run.pending = timers.schedule(
            due,
            TaskAction::MetronomeTick {
                beat_index: run.next_beat,
            },
        );

        Some(ClickType::for_beat(beat_index, beats_per_bar))
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new()
    }
}
