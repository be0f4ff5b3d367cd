// Transport - Record/playback state machine
// Owns the pattern store, the timer arena, the metronome and the count-in.
// All mutation happens on the control thread; the sound engine and the UI only
// receive fire-and-forget requests and events.

use super::clock::Clock;
use super::config::{Quantization, TransportConfig};
use super::count_in::CountIn;
use super::metronome::{ClickType, Metronome};
use super::pattern::{PadHit, Pattern, PatternStore};
use super::quantize::quantize;
use super::scheduler::{FiredTask, TaskAction, TimerArena};
use super::timeline::{BarBeat, Tempo, TimeSignature};
use super::{SequencerError, SequencerResult};
use crate::messaging::channels::EventProducer;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::pads::engine::{SampleLoadError, SoundEngine};
use crate::pads::kit::{PadKit, SampleLoadReport};
use crate::pads::{PadActivity, PadId};
use std::collections::BTreeSet;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    CountingIn,
    Recording,
    /// Recording into an existing pattern while it plays back
    Overdubbing,
    Playing,
}

impl TransportState {
    /// Check if hits are being captured (Recording or Overdubbing)
    pub fn is_recording(&self) -> bool {
        matches!(self, TransportState::Recording | TransportState::Overdubbing)
    }

    /// Check if the pattern is audible (Playing or Overdubbing)
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Overdubbing)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TransportState::Idle)
    }
}

/// Why a pad sounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Played by hand outside recording
    Live,
    /// Played by hand while recording
    Monitor,
    /// Scheduled pattern playback
    Playback,
}

/// Events published to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StateChanged {
        from: TransportState,
        to: TransportState,
    },
    Click {
        click: ClickType,
        count_in: bool,
        at_ms: f64,
    },
    PadTriggered {
        pad_id: PadId,
        source: TriggerSource,
        at_ms: f64,
    },
    HitRecorded(PadHit),
    RecordingFinalized {
        duration_ms: f64,
    },
    CycleStarted {
        cycle: u64,
        at_ms: f64,
    },
    PlaybackFinished,
    Notification(Notification),
}

/// Read-only view for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSnapshot {
    pub state: TransportState,
    /// Time into the current playback cycle or recording pass
    pub elapsed_ms: f64,
    pub position: BarBeat,
    /// Metronome beats emitted by the current run
    pub beat_count: u64,
    pub cycle: u64,
    pub count_in_remaining: u32,
    /// Visible timeline length: the longer of the pattern and the configured measures
    pub timeline_ms: f64,
    pub pattern: Option<Pattern>,
    pub active_pads: Vec<PadId>,
    pub unavailable_pads: Vec<PadId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordMode {
    New,
    Overdub,
}

#[derive(Debug, Clone, Copy)]
struct PlaybackRun {
    origin_ms: f64,
    duration_ms: f64,
    cycle: u64,
}

/// Transport controller
pub struct Transport<C: Clock, E: SoundEngine> {
    clock: C,
    engine: E,
    kit: PadKit,
    config: TransportConfig,
    state: TransportState,
    store: PatternStore,
    timers: TimerArena,
    metronome: Metronome,
    count_in: CountIn,
    pending_record: Option<RecordMode>,
    recording_origin_ms: Option<f64>,
    playback: Option<PlaybackRun>,
    activity: PadActivity,
    unavailable: BTreeSet<PadId>,
    events: Option<EventProducer>,
    dropped_events: u64,
}

impl<C: Clock, E: SoundEngine> Transport<C, E> {
    /// Create new transport with the default configuration
    pub fn new(clock: C, engine: E, kit: PadKit) -> Self {
        Self::with_config(clock, engine, kit, TransportConfig::default())
    }

    pub fn with_config(clock: C, engine: E, kit: PadKit, config: TransportConfig) -> Self {
        let config = config.with_measures(config.measures);
        Self {
            clock,
            engine,
            kit,
            config,
            state: TransportState::Idle,
            store: PatternStore::new(),
            timers: TimerArena::new(),
            metronome: Metronome::with_beats_per_bar(config.time_signature.beats_per_bar()),
            count_in: CountIn::new(),
            pending_record: None,
            recording_origin_ms: None,
            playback: None,
            activity: PadActivity::new(),
            unavailable: BTreeSet::new(),
            events: None,
            dropped_events: 0,
        }
    }

    /// Publish events into `tx` from now on
    pub fn attach_events(&mut self, tx: EventProducer) {
        self.events = Some(tx);
    }

    // ---- accessors ----

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn kit(&self) -> &PadKit {
        &self.kit
    }

    /// The playable pattern, if one has been recorded
    pub fn pattern(&self) -> Option<&Pattern> {
        self.store.pattern()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of timers still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Due time of the next timer, for hosts that sleep between polls
    pub fn next_due_ms(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Events lost because the UI did not drain its queue
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn is_pad_available(&self, pad_id: PadId) -> bool {
        self.kit.contains(pad_id) && !self.unavailable.contains(&pad_id)
    }

    // ---- configuration ----

    pub fn set_config(&mut self, config: TransportConfig) {
        let metronome = config.metronome;
        self.config = config.with_measures(config.measures);
        self.apply_metronome_toggle(metronome);
    }

    pub fn set_bpm(&mut self, bpm: f64) -> SequencerResult<()> {
        let tempo = Tempo::new(bpm)?;
        if tempo.bpm() != bpm {
            let now = self.clock.now_ms();
            self.emit(TransportEvent::Notification(Notification::info(
                NotificationCategory::Config,
                format!("Tempo {} out of range, using {}", bpm, tempo),
                now,
            )));
        }
        self.config.tempo = tempo;
        Ok(())
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.config.time_signature = time_signature;
    }

    pub fn set_measures(&mut self, measures: u8) {
        self.config = self.config.with_measures(measures);
    }

    pub fn set_quantization(&mut self, quantization: Option<Quantization>) {
        self.config.quantization = quantization;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.config.looping = looping;
    }

    /// Turning the metronome off silences a running click immediately;
    /// turning it on takes effect from the next record or play.
    pub fn set_metronome(&mut self, enabled: bool) {
        self.config.metronome = enabled;
        self.apply_metronome_toggle(enabled);
    }

    pub fn set_count_in(&mut self, enabled: bool) {
        self.config.count_in = enabled;
    }

    /// Set the loop flag stored on the pattern itself
    pub fn set_pattern_loop(&mut self, enabled: bool) -> bool {
        self.store.set_loop(enabled)
    }

    fn apply_metronome_toggle(&mut self, enabled: bool) {
        if !enabled && self.metronome.stop(&mut self.timers) {
            log::debug!("metronome disabled while running");
        }
    }

    // ---- samples ----

    /// Load every pad's sample; failures mark pads unavailable without aborting
    pub fn load_samples(&mut self) -> SampleLoadReport {
        let report = self.kit.load_samples(&mut self.engine);
        for (pad_id, error) in &report.failed {
            self.mark_unavailable(*pad_id, error);
        }
        report
    }

    /// Record a failure reported later by an asynchronous engine
    pub fn report_sample_failure(&mut self, pad_id: PadId, error: SampleLoadError) {
        log::warn!("Sample for {} unavailable: {}", pad_id, error);
        self.mark_unavailable(pad_id, &error);
    }

    fn mark_unavailable(&mut self, pad_id: PadId, error: &SampleLoadError) {
        self.unavailable.insert(pad_id);
        let now = self.clock.now_ms();
        self.emit(TransportEvent::Notification(Notification::error(
            NotificationCategory::Sample,
            format!("{}: {}", pad_id, error),
            now,
        )));
    }

    // ---- commands ----

    /// Start recording: a new pattern if none exists, otherwise an overdub
    pub fn record(&mut self) -> SequencerResult<()> {
        let now = self.clock.now_ms();
        let config = self.config;

        if self.state != TransportState::Idle {
            return Err(self.rejected("record"));
        }

        let mode = if self.store.has_pattern() {
            RecordMode::Overdub
        } else {
            self.store.begin_new(self.state)?;
            RecordMode::New
        };

        if config.count_in {
            self.count_in.run(
                &mut self.timers,
                now,
                config.tempo.beat_duration_ms(),
                config.time_signature.beats_per_bar(),
            )?;
            self.pending_record = Some(mode);
            self.set_state(TransportState::CountingIn);
        } else if let Err(e) = self.begin_recording(now, mode, &config) {
            self.teardown();
            return Err(e);
        }

        self.pump(now);
        Ok(())
    }

    /// Finish the current take (or abandon a count-in)
    pub fn stop_recording(&mut self) -> SequencerResult<()> {
        match self.state {
            TransportState::Recording | TransportState::Overdubbing => {
                let now = self.clock.now_ms();
                self.pump(now);
                self.finish_take(now);
                Ok(())
            }
            TransportState::CountingIn => {
                self.abandon_count_in();
                Ok(())
            }
            _ => Err(self.rejected("stop_recording")),
        }
    }

    /// Play the recorded pattern from the top
    pub fn play(&mut self) -> SequencerResult<()> {
        let now = self.clock.now_ms();
        let config = self.config;

        match self.state {
            TransportState::Playing => {
                log::warn!("play() while already playing, ignored");
                self.emit(TransportEvent::Notification(Notification::warning(
                    NotificationCategory::Transport,
                    "Already playing".to_string(),
                    now,
                )));
                return Ok(());
            }
            TransportState::Idle => {}
            _ => return Err(self.rejected("play")),
        }

        if !self.store.has_pattern() {
            return Err(SequencerError::InvalidTransportState {
                command: "play without a pattern",
                state: self.state,
            });
        }

        self.start_cycle(now, 0);
        self.set_state(TransportState::Playing);
        if config.metronome {
            self.start_metronome(now, &config)?;
        }

        self.pump(now);
        Ok(())
    }

    /// Stop everything. Pending timers are cancelled before anything else
    /// can fire; hits already recorded are kept.
    pub fn stop(&mut self) -> SequencerResult<()> {
        match self.state {
            TransportState::Idle => Ok(()),
            TransportState::Playing => {
                self.teardown();
                self.set_state(TransportState::Idle);
                Ok(())
            }
            TransportState::Recording | TransportState::Overdubbing => {
                let now = self.clock.now_ms();
                self.finish_take(now);
                Ok(())
            }
            TransportState::CountingIn => {
                self.abandon_count_in();
                Ok(())
            }
        }
    }

    /// Discard the pattern
    pub fn clear(&mut self) -> SequencerResult<()> {
        self.store.clear(self.state)?;
        self.activity.clear();
        log::info!("pattern cleared");
        Ok(())
    }

    /// A pad was hit by the performer: sound it and, while recording, capture it
    pub fn press_pad(&mut self, pad_id: PadId) -> SequencerResult<Option<PadHit>> {
        if !self.kit.contains(pad_id) {
            return Err(SequencerError::UnknownPad(pad_id));
        }

        let now = self.clock.now_ms();
        self.pump(now);

        if self.state.is_recording() {
            let hit = self.record_hit_at(pad_id, now)?;
            self.trigger_pad(pad_id, TriggerSource::Monitor, now);
            Ok(Some(hit))
        } else {
            self.trigger_pad(pad_id, TriggerSource::Live, now);
            Ok(None)
        }
    }

    /// Keyboard entry point; unbound keys are ignored
    pub fn press_key(&mut self, key: char) -> SequencerResult<Option<PadHit>> {
        match self.kit.pad_for_key(key).map(|pad| pad.id) {
            Some(pad_id) => self.press_pad(pad_id),
            None => {
                log::debug!("no pad bound to key {:?}", key);
                Ok(None)
            }
        }
    }

    /// Append a hit at the current time without sounding it
    pub fn record_hit(&mut self, pad_id: PadId) -> SequencerResult<PadHit> {
        if !self.kit.contains(pad_id) {
            return Err(SequencerError::UnknownPad(pad_id));
        }
        let now = self.clock.now_ms();
        self.pump(now);
        self.record_hit_at(pad_id, now)
    }

    /// Fire every timer due at the current clock time. Returns how many fired.
    pub fn poll(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.pump(now)
    }

    /// Rendering view at the current clock time
    pub fn snapshot(&self) -> TransportSnapshot {
        let now = self.clock.now_ms();
        let config = &self.config;

        let origin = match self.state {
            TransportState::Playing | TransportState::Overdubbing => self
                .playback
                .map(|run| run.origin_ms)
                .or(self.recording_origin_ms),
            TransportState::Recording => self.recording_origin_ms,
            TransportState::Idle | TransportState::CountingIn => None,
        };
        let elapsed_ms = origin.map_or(0.0, |origin| (now - origin).max(0.0));

        let pattern = self.store.live().cloned();
        let pattern_ms = pattern.as_ref().map_or(0.0, Pattern::duration_ms);

        TransportSnapshot {
            state: self.state,
            elapsed_ms,
            position: BarBeat::from_ms(elapsed_ms, &config.tempo, &config.time_signature),
            beat_count: self.metronome.beats_emitted(),
            cycle: self.playback.map_or(0, |run| run.cycle),
            count_in_remaining: self.count_in.remaining_beats(),
            timeline_ms: pattern_ms.max(config.measures_duration_ms()),
            pattern,
            active_pads: self.activity.active_pads(now),
            unavailable_pads: self.unavailable.iter().copied().collect(),
        }
    }

    // ---- internals ----

    fn rejected(&self, command: &'static str) -> SequencerError {
        log::warn!("{} rejected while {:?}", command, self.state);
        SequencerError::InvalidTransportState {
            command,
            state: self.state,
        }
    }

    fn set_state(&mut self, to: TransportState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        log::info!("transport {:?} -> {:?}", from, to);
        self.emit(TransportEvent::StateChanged { from, to });
    }

    fn emit(&mut self, event: TransportEvent) {
        if let Some(tx) = self.events.as_mut() {
            if ringbuf::traits::Producer::try_push(tx, event).is_err() {
                self.dropped_events += 1;
                log::warn!("Event queue full, event dropped");
            }
        }
    }

    fn begin_recording(
        &mut self,
        origin_ms: f64,
        mode: RecordMode,
        config: &TransportConfig,
    ) -> SequencerResult<()> {
        self.recording_origin_ms = Some(origin_ms);

        match mode {
            RecordMode::New => self.set_state(TransportState::Recording),
            RecordMode::Overdub => {
                // Playback and recording share one origin
                self.start_cycle(origin_ms, 0);
                self.set_state(TransportState::Overdubbing);
            }
        }

        if config.metronome {
            self.start_metronome(origin_ms, config)?;
        }
        Ok(())
    }

    fn start_metronome(&mut self, origin_ms: f64, config: &TransportConfig) -> SequencerResult<()> {
        if !self.metronome.is_running() {
            self.metronome = Metronome::with_beats_per_bar(config.time_signature.beats_per_bar());
        }
        self.metronome
            .start(&mut self.timers, origin_ms, config.tempo.beat_duration_ms())?;
        Ok(())
    }

    /// Schedule every hit of the pattern as it is right now, plus the cycle end
    fn start_cycle(&mut self, origin_ms: f64, cycle: u64) {
        let Some(pattern) = self.store.live() else {
            return;
        };
        let hits = pattern.hits_by_time();
        let duration_ms = pattern.duration_ms();

        for hit in &hits {
            self.timers.schedule(
                origin_ms + hit.timestamp_ms,
                TaskAction::PlayHit {
                    pad_id: hit.pad_id,
                    cycle,
                },
            );
        }
        self.timers
            .schedule(origin_ms + duration_ms, TaskAction::CycleEnd { cycle });

        self.playback = Some(PlaybackRun {
            origin_ms,
            duration_ms,
            cycle,
        });
        log::debug!(
            "cycle {} scheduled: {} hits over {:.1}ms",
            cycle,
            hits.len(),
            duration_ms
        );
        self.emit(TransportEvent::CycleStarted {
            cycle,
            at_ms: origin_ms,
        });
    }

    fn record_hit_at(&mut self, pad_id: PadId, now_ms: f64) -> SequencerResult<PadHit> {
        let origin = match self.recording_origin_ms {
            Some(origin) if self.state.is_recording() => origin,
            _ => return Err(self.rejected("record_hit")),
        };

        let raw_ms = (now_ms - origin).max(0.0);
        let mut timestamp_ms = match self.config.quantization {
            Some(grid) => quantize(raw_ms, self.config.tempo.bpm(), grid)?,
            None => raw_ms,
        };

        // A looped overdub never stretches the loop: hits snapped past the
        // end land at the same instant of the next cycle
        if self.state == TransportState::Overdubbing {
            if let Some(run) = self.playback.filter(|run| self.loops(run)) {
                timestamp_ms = timestamp_ms.rem_euclid(run.duration_ms);
            }
        }

        let hit = self.store.append_hit(self.state, pad_id, timestamp_ms)?;
        log::debug!(
            "recorded {} at {:.1}ms (raw {:.1}ms)",
            pad_id,
            hit.timestamp_ms,
            raw_ms
        );
        self.emit(TransportEvent::HitRecorded(hit));
        Ok(hit)
    }

    fn trigger_pad(&mut self, pad_id: PadId, source: TriggerSource, at_ms: f64) {
        self.activity.record(pad_id, at_ms);
        if self.unavailable.contains(&pad_id) {
            log::debug!("{} has no sample, trigger skipped", pad_id);
        } else {
            self.engine.trigger(pad_id);
        }
        self.emit(TransportEvent::PadTriggered {
            pad_id,
            source,
            at_ms,
        });
    }

    fn click(&mut self, click: ClickType, count_in: bool, at_ms: f64) {
        self.engine.click(click);
        self.emit(TransportEvent::Click {
            click,
            count_in,
            at_ms,
        });
    }

    fn finish_take(&mut self, now_ms: f64) {
        let measured = self
            .recording_origin_ms
            .map_or(0.0, |origin| (now_ms - origin).max(0.0));
        self.teardown();

        if let Some(duration_ms) = self.store.finalize(measured) {
            log::info!("take finalized, pattern is {:.1}ms", duration_ms);
            self.emit(TransportEvent::RecordingFinalized { duration_ms });
        }
        self.set_state(TransportState::Idle);
    }

    fn abandon_count_in(&mut self) {
        let mode = self.pending_record;
        self.teardown();
        if mode == Some(RecordMode::New) {
            self.store.discard_draft();
        }
        self.set_state(TransportState::Idle);
    }

    /// Cancel every pending timer and forget all run state
    fn teardown(&mut self) {
        let cancelled = self.timers.cancel_all();
        self.metronome.stop(&mut self.timers);
        self.count_in.cancel(&mut self.timers);
        self.pending_record = None;
        self.recording_origin_ms = None;
        self.playback = None;
        if cancelled > 0 {
            log::debug!("cancelled {} pending timers", cancelled);
        }
    }

    fn pump(&mut self, now_ms: f64) -> usize {
        let mut fired = 0;
        while let Some(task) = self.timers.pop_due(now_ms) {
            self.dispatch(task);
            fired += 1;
        }
        fired
    }

    fn dispatch(&mut self, task: FiredTask) {
        match task.action {
            TaskAction::PlayHit { pad_id, cycle } => {
                if self.playback.is_some_and(|run| run.cycle == cycle) {
                    self.trigger_pad(pad_id, TriggerSource::Playback, task.due_ms);
                }
            }
            TaskAction::MetronomeTick { beat_index } => {
                if let Some(click) = self.metronome.on_tick(&mut self.timers, beat_index) {
                    self.click(click, false, task.due_ms);
                }
            }
            TaskAction::CountInBeat { index } => {
                if let Some(click) = self.count_in.on_beat(index) {
                    self.click(click, true, task.due_ms);
                }
            }
            TaskAction::CountInComplete => {
                if self.count_in.on_complete() && self.state == TransportState::CountingIn {
                    let mode = self.pending_record.take().unwrap_or(RecordMode::New);
                    let config = self.config;
                    if let Err(e) = self.begin_recording(task.due_ms, mode, &config) {
                        log::error!("could not start recording after count-in: {}", e);
                        self.abandon_count_in();
                    }
                }
            }
            TaskAction::CycleEnd { cycle } => self.end_cycle(cycle, task.due_ms),
        }
    }

    /// Whether `run` restarts when it reaches its end
    fn loops(&self, run: &PlaybackRun) -> bool {
        let pattern_loops = self.store.live().is_some_and(Pattern::is_loop);
        (self.config.looping || pattern_loops) && run.duration_ms > 0.0
    }

    fn end_cycle(&mut self, cycle: u64, due_ms: f64) {
        let Some(run) = self.playback.filter(|run| run.cycle == cycle) else {
            return;
        };
        if self.loops(&run) {
            // Next cycle starts where this one was scheduled to end
            let origin_ms = run.origin_ms + run.duration_ms;
            if self.state == TransportState::Overdubbing {
                self.recording_origin_ms = Some(origin_ms);
            }
            self.start_cycle(origin_ms, cycle + 1);
            return;
        }

        self.playback = None;
        self.emit(TransportEvent::PlaybackFinished);
        log::debug!("playback finished at {:.1}ms", due_ms);

        if self.state == TransportState::Playing {
            self.teardown();
            self.set_state(TransportState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::{EventConsumer, create_event_channel};
    use crate::pads::engine::TriggerRequest;
    use crate::sequencer::clock::ManualClock;
    use ringbuf::traits::Consumer;

    /// Sound engine that remembers every request with the clock time it arrived
    #[derive(Default)]
    struct RecordingEngine {
        clock: ManualClock,
        requests: Vec<(f64, TriggerRequest)>,
    }

    impl RecordingEngine {
        fn pads(&self) -> Vec<(f64, u8)> {
            self.requests
                .iter()
                .filter_map(|(t, r)| match r {
                    TriggerRequest::Pad(id) => Some((*t, id.0)),
                    TriggerRequest::Click(_) => None,
                })
                .collect()
        }

        fn clicks(&self) -> Vec<(f64, ClickType)> {
            self.requests
                .iter()
                .filter_map(|(t, r)| match r {
                    TriggerRequest::Click(c) => Some((*t, *c)),
                    TriggerRequest::Pad(_) => None,
                })
                .collect()
        }
    }

    impl SoundEngine for RecordingEngine {
        fn load_sample(&mut self, pad_id: PadId, _source: &str) -> Result<(), SampleLoadError> {
            if pad_id == PadId(16) {
                Err(SampleLoadError::Missing("perc2.wav".to_string()))
            } else {
                Ok(())
            }
        }

        fn trigger(&mut self, pad_id: PadId) {
            self.requests
                .push((self.clock.now_ms(), TriggerRequest::Pad(pad_id)));
        }

        fn click(&mut self, click: ClickType) {
            self.requests
                .push((self.clock.now_ms(), TriggerRequest::Click(click)));
        }
    }

    fn transport(config: TransportConfig) -> (ManualClock, Transport<ManualClock, RecordingEngine>) {
        let clock = ManualClock::new();
        let engine = RecordingEngine {
            clock: clock.clone(),
            requests: Vec::new(),
        };
        let transport = Transport::with_config(clock.clone(), engine, PadKit::default_kit(), config);
        (clock, transport)
    }

    fn quiet() -> TransportConfig {
        TransportConfig {
            metronome: false,
            ..TransportConfig::default()
        }
    }

    fn drain(rx: &mut EventConsumer) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.try_pop() {
            events.push(event);
        }
        events
    }

    /// Record pad hits at the given raw times, then stop at `stop_at`
    fn record_take(
        clock: &ManualClock,
        transport: &mut Transport<ManualClock, RecordingEngine>,
        hits: &[(u8, f64)],
        stop_at: f64,
    ) {
        let start = clock.now_ms();
        transport.record().unwrap();
        for &(pad, at) in hits {
            clock.set(start + at);
            transport.press_pad(PadId(pad)).unwrap();
        }
        clock.set(start + stop_at);
        transport.stop_recording().unwrap();
    }

    #[test]
    fn test_transport_state_helpers() {
        assert!(TransportState::Recording.is_recording());
        assert!(TransportState::Overdubbing.is_recording());
        assert!(TransportState::Overdubbing.is_playing());
        assert!(TransportState::Playing.is_playing());
        assert!(!TransportState::CountingIn.is_playing());
        assert!(!TransportState::CountingIn.is_recording());
        assert!(TransportState::default().is_idle());
    }

    #[test]
    fn test_record_quantizes_and_finalizes() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(2, 0.0), (2, 480.0), (2, 1000.0)], 1200.0);

        let pattern = transport.pattern().unwrap();
        let times: Vec<f64> = pattern.hits().iter().map(|h| h.timestamp_ms).collect();
        assert_eq!(times, vec![0.0, 500.0, 1000.0]);
        assert_eq!(pattern.duration_ms(), 1200.0);
        assert_eq!(transport.state(), TransportState::Idle);

        // Record monitoring sounded every hit
        assert_eq!(
            transport.engine().pads(),
            vec![(0.0, 2), (480.0, 2), (1000.0, 2)]
        );
    }

    #[test]
    fn test_unquantized_recording_keeps_raw_times() {
        let (clock, mut transport) = transport(TransportConfig {
            quantization: None,
            ..quiet()
        });
        record_take(&clock, &mut transport, &[(1, 130.0)], 400.0);
        assert_eq!(transport.pattern().unwrap().hits()[0].timestamp_ms, 130.0);
    }

    #[test]
    fn test_record_hit_rejected_when_idle() {
        let (_clock, mut transport) = transport(quiet());
        assert_eq!(
            transport.record_hit(PadId(1)),
            Err(SequencerError::InvalidTransportState {
                command: "record_hit",
                state: TransportState::Idle
            })
        );
    }

    #[test]
    fn test_unknown_pad_rejected() {
        let (_clock, mut transport) = transport(quiet());
        assert_eq!(
            transport.press_pad(PadId(42)),
            Err(SequencerError::UnknownPad(PadId(42)))
        );
    }

    #[test]
    fn test_live_press_outside_recording_sounds_but_is_not_recorded() {
        let (clock, mut transport) = transport(quiet());
        clock.set(50.0);
        assert_eq!(transport.press_key('q').unwrap(), None);
        assert_eq!(transport.engine().pads(), vec![(50.0, 1)]);
        assert!(transport.pattern().is_none());
        assert_eq!(transport.press_key('?').unwrap(), None);
    }

    #[test]
    fn test_play_without_pattern_rejected() {
        let (_clock, mut transport) = transport(quiet());
        assert!(matches!(
            transport.play(),
            Err(SequencerError::InvalidTransportState { .. })
        ));
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_playback_schedules_hits_in_time_order() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(3, 500.0), (1, 0.0), (2, 250.0)], 1000.0);

        clock.set(10_000.0);
        transport.play().unwrap();
        assert_eq!(transport.state(), TransportState::Playing);

        clock.set(12_000.0);
        transport.poll();

        let played: Vec<u8> = transport
            .engine()
            .pads()
            .into_iter()
            .skip(3)
            .map(|(_, pad)| pad)
            .collect();
        assert_eq!(played, vec![1, 2, 3]);
        // Not looping: back to idle once the pattern ends
        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(transport.pending_timers(), 0);
    }

    #[test]
    fn test_double_play_is_noop_with_warning() {
        let (clock, mut transport) = transport(quiet());
        let (tx, mut rx) = create_event_channel(64);
        transport.attach_events(tx);
        record_take(&clock, &mut transport, &[(1, 0.0)], 1000.0);

        transport.play().unwrap();
        let pending = transport.pending_timers();
        drain(&mut rx);

        transport.play().unwrap();
        assert_eq!(transport.pending_timers(), pending);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [TransportEvent::Notification(_)]));
    }

    #[test]
    fn test_loop_restarts_on_schedule_without_drift() {
        let (clock, mut transport) = transport(TransportConfig {
            looping: true,
            ..quiet()
        });
        let (tx, mut rx) = create_event_channel(256);
        record_take(&clock, &mut transport, &[(1, 0.0), (2, 500.0)], 1000.0);
        transport.attach_events(tx);

        clock.set(5_000.0);
        transport.play().unwrap();

        // Poll late, well past two cycle ends
        clock.set(7_003.0);
        transport.poll();
        assert_eq!(transport.state(), TransportState::Playing);

        let triggers: Vec<(f64, u8)> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::PadTriggered {
                    pad_id,
                    source: TriggerSource::Playback,
                    at_ms,
                } => Some((at_ms, pad_id.0)),
                _ => None,
            })
            .collect();
        assert_eq!(
            triggers,
            vec![
                (5_000.0, 1),
                (5_500.0, 2),
                (6_000.0, 1),
                (6_500.0, 2),
                (7_000.0, 1)
            ]
        );
        assert_eq!(transport.snapshot().cycle, 2);
    }

    #[test]
    fn test_pattern_loop_flag_also_loops() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(1, 0.0)], 1000.0);
        assert!(transport.set_pattern_loop(true));

        transport.play().unwrap();
        clock.advance(2_500.0);
        transport.poll();
        assert_eq!(transport.state(), TransportState::Playing);
    }

    #[test]
    fn test_stop_cancels_everything_pending() {
        let (clock, mut transport) = transport(TransportConfig {
            looping: true,
            ..TransportConfig::default()
        });
        record_take(&clock, &mut transport, &[(1, 0.0), (2, 500.0), (3, 900.0)], 1000.0);

        clock.set(2_000.0);
        transport.play().unwrap();
        clock.set(2_100.0);
        transport.poll();
        transport.stop().unwrap();

        assert_eq!(transport.pending_timers(), 0);
        let before = transport.engine().requests.len();

        clock.set(20_000.0);
        transport.poll();
        assert_eq!(transport.engine().requests.len(), before);
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_metronome_clicks_while_recording() {
        let (clock, mut transport) = transport(TransportConfig::default());
        transport.record().unwrap();
        clock.set(1_999.0);
        transport.poll();

        let clicks = transport.engine().clicks();
        assert_eq!(
            clicks,
            vec![
                (0.0, ClickType::Accent),
                (1_999.0, ClickType::Regular),
                (1_999.0, ClickType::Regular),
                (1_999.0, ClickType::Regular)
            ]
        );
        assert_eq!(transport.snapshot().beat_count, 4);

        transport.stop_recording().unwrap();
        assert_eq!(transport.pending_timers(), 0);
    }

    #[test]
    fn test_count_in_then_record() {
        let (clock, mut transport) = transport(TransportConfig {
            count_in: true,
            metronome: false,
            ..TransportConfig::default()
        });
        let (tx, mut rx) = create_event_channel(64);
        transport.attach_events(tx);

        transport.record().unwrap();
        assert_eq!(transport.state(), TransportState::CountingIn);
        assert_eq!(transport.snapshot().count_in_remaining, 3);

        // Presses during the count-in are heard but not recorded
        clock.set(1_000.0);
        assert_eq!(transport.press_pad(PadId(1)).unwrap(), None);

        clock.set(2_000.0);
        transport.poll();
        assert_eq!(transport.state(), TransportState::Recording);

        clock.set(2_130.0);
        let hit = transport.press_pad(PadId(4)).unwrap().unwrap();
        assert_eq!(hit.timestamp_ms, 125.0);

        let count_in_clicks = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TransportEvent::Click { count_in: true, .. }))
            .count();
        assert_eq!(count_in_clicks, 4);
    }

    #[test]
    fn test_stop_during_count_in_discards_new_take() {
        let (clock, mut transport) = transport(TransportConfig {
            count_in: true,
            ..TransportConfig::default()
        });
        transport.record().unwrap();
        clock.set(700.0);
        transport.poll();
        transport.stop_recording().unwrap();

        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(transport.pending_timers(), 0);
        assert!(transport.pattern().is_none());
        assert!(transport.snapshot().pattern.is_none());

        // Completion never fires later
        clock.set(5_000.0);
        transport.poll();
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_overdub_appends_and_keeps_longest_duration() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(1, 0.0), (1, 1000.0)], 2000.0);

        clock.set(10_000.0);
        transport.record().unwrap();
        assert_eq!(transport.state(), TransportState::Overdubbing);
        assert!(transport.state().is_playing());

        // Existing hit at 0 plays immediately alongside the new take
        assert_eq!(transport.engine().pads().last(), Some(&(10_000.0, 1)));

        clock.set(10_510.0);
        transport.press_pad(PadId(2)).unwrap();
        clock.set(11_500.0);
        transport.stop_recording().unwrap();

        let pattern = transport.pattern().unwrap();
        let recorded: Vec<(u8, f64)> = pattern
            .hits()
            .iter()
            .map(|h| (h.pad_id.0, h.timestamp_ms))
            .collect();
        assert_eq!(recorded, vec![(1, 0.0), (1, 1000.0), (2, 500.0)]);
        // Shorter second pass never truncates the loop
        assert_eq!(pattern.duration_ms(), 2000.0);
    }

    #[test]
    fn test_overdub_across_loop_uses_cycle_origin() {
        let (clock, mut transport) = transport(TransportConfig {
            looping: true,
            ..quiet()
        });
        record_take(&clock, &mut transport, &[(1, 0.0)], 1000.0);

        clock.set(5_000.0);
        transport.record().unwrap();

        // Second cycle starts at 6000; a hit at 6250 lands at 250
        clock.set(6_250.0);
        let hit = transport.press_pad(PadId(3)).unwrap().unwrap();
        assert_eq!(hit.timestamp_ms, 250.0);

        clock.set(6_400.0);
        transport.stop_recording().unwrap();
        assert_eq!(transport.pattern().unwrap().duration_ms(), 1000.0);
    }

    #[test]
    fn test_looped_overdub_wraps_hits_past_loop_end() {
        let (clock, mut transport) = transport(TransportConfig {
            looping: true,
            ..quiet()
        });
        record_take(&clock, &mut transport, &[(1, 0.0)], 1100.0);

        clock.set(5_000.0);
        transport.record().unwrap();

        // 1090ms snaps to 1125ms, past the 1100ms loop
        clock.set(6_090.0);
        let hit = transport.press_pad(PadId(5)).unwrap().unwrap();
        assert_eq!(hit.timestamp_ms, 25.0);

        // Heard on the next cycle, 25ms after its downbeat
        clock.set(6_125.0);
        transport.poll();
        let pad5: Vec<(f64, u8)> = transport
            .engine()
            .pads()
            .into_iter()
            .filter(|&(_, pad)| pad == 5)
            .collect();
        assert_eq!(pad5, vec![(6_090.0, 5), (6_125.0, 5)]);

        clock.set(6_300.0);
        transport.stop_recording().unwrap();
        assert_eq!(transport.pattern().unwrap().duration_ms(), 1100.0);
    }

    #[test]
    fn test_one_shot_overdub_keeps_late_hit_time() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(1, 0.0)], 1100.0);

        clock.set(5_000.0);
        transport.record().unwrap();
        clock.set(6_090.0);
        let hit = transport.press_pad(PadId(5)).unwrap().unwrap();
        assert_eq!(hit.timestamp_ms, 1125.0);
    }

    #[test]
    fn test_time_signature_drives_count_in_length() {
        let (clock, mut transport) = transport(TransportConfig {
            count_in: true,
            ..quiet()
        });
        transport.set_time_signature(TimeSignature::new(3, 4).unwrap());

        transport.record().unwrap();
        assert_eq!(transport.snapshot().count_in_remaining, 2);
        clock.set(1_500.0);
        transport.poll();
        assert_eq!(transport.state(), TransportState::Recording);
    }

    #[test]
    fn test_constructor_clamps_measures() {
        let (_clock, low) = transport(TransportConfig {
            measures: 0,
            ..quiet()
        });
        assert_eq!(low.config().measures, TransportConfig::MIN_MEASURES);

        let (_clock, high) = transport(TransportConfig {
            measures: 40,
            ..quiet()
        });
        assert_eq!(high.config().measures, TransportConfig::MAX_MEASURES);
    }

    #[test]
    fn test_clear_only_when_idle() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(1, 0.0)], 1000.0);

        transport.play().unwrap();
        assert!(transport.clear().is_err());
        transport.stop().unwrap();
        transport.clear().unwrap();
        assert!(transport.pattern().is_none());

        // A fresh take starts over
        record_take(&clock, &mut transport, &[(5, 0.0)], 300.0);
        assert_eq!(transport.pattern().unwrap().hit_count(), 1);
    }

    #[test]
    fn test_commands_rejected_in_wrong_state() {
        let (_clock, mut transport) = transport(quiet());
        assert!(transport.stop_recording().is_err());

        transport.record().unwrap();
        assert!(matches!(
            transport.record(),
            Err(SequencerError::InvalidTransportState {
                command: "record",
                state: TransportState::Recording
            })
        ));
        assert!(transport.play().is_err());
        assert!(transport.clear().is_err());
    }

    #[test]
    fn test_stop_while_recording_keeps_hits() {
        let (clock, mut transport) = transport(quiet());
        transport.record().unwrap();
        clock.set(250.0);
        transport.press_pad(PadId(6)).unwrap();
        clock.set(600.0);
        transport.stop().unwrap();

        let pattern = transport.pattern().unwrap();
        assert_eq!(pattern.hit_count(), 1);
        assert_eq!(pattern.duration_ms(), 600.0);
    }

    #[test]
    fn test_invalid_bpm_rejected_at_setter() {
        let (_clock, mut transport) = transport(quiet());
        assert!(matches!(
            transport.set_bpm(0.0),
            Err(SequencerError::InvalidConfiguration(_))
        ));
        assert_eq!(transport.config().tempo.bpm(), 120.0);
        transport.set_bpm(90.0).unwrap();
        assert_eq!(transport.config().tempo.bpm(), 90.0);
    }

    #[test]
    fn test_clamped_bpm_is_reported() {
        let (_clock, mut transport) = transport(quiet());
        let (tx, mut rx) = create_event_channel(8);
        transport.attach_events(tx);

        transport.set_bpm(300.0).unwrap();
        assert_eq!(transport.config().tempo.bpm(), Tempo::MAX_BPM);
        match drain(&mut rx).as_slice() {
            [TransportEvent::Notification(n)] => {
                assert_eq!(n.category, NotificationCategory::Config)
            }
            other => panic!("unexpected events {:?}", other),
        }

        transport.set_bpm(100.0).unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_disabling_metronome_silences_it() {
        let (clock, mut transport) = transport(TransportConfig::default());
        transport.record().unwrap();
        transport.set_metronome(false);

        clock.set(3_000.0);
        transport.poll();
        assert_eq!(transport.engine().clicks().len(), 1);
    }

    #[test]
    fn test_unavailable_pad_records_but_stays_silent() {
        let (clock, mut transport) = transport(quiet());
        let report = transport.load_samples();
        assert_eq!(report.failed.len(), 1);
        assert!(!transport.is_pad_available(PadId(16)));

        transport.record().unwrap();
        clock.set(10.0);
        let hit = transport.press_pad(PadId(16)).unwrap();
        assert!(hit.is_some());
        assert!(transport.engine().pads().is_empty());
        assert!(transport.snapshot().active_pads.contains(&PadId(16)));
        assert_eq!(transport.snapshot().unavailable_pads, vec![PadId(16)]);
    }

    #[test]
    fn test_snapshot_position_and_activity() {
        let (clock, mut transport) = transport(quiet());
        record_take(&clock, &mut transport, &[(1, 0.0), (2, 2_500.0)], 4_000.0);

        clock.set(10_000.0);
        transport.play().unwrap();
        clock.set(12_550.0);
        transport.poll();

        let snapshot = transport.snapshot();
        assert_eq!(snapshot.state, TransportState::Playing);
        assert_eq!(snapshot.elapsed_ms, 2_550.0);
        assert_eq!(snapshot.position, BarBeat { bar: 2, beat: 2 });
        assert_eq!(snapshot.active_pads, vec![PadId(2)]);
        // 4 measures at 120 BPM outlast the 4s pattern
        assert_eq!(snapshot.timeline_ms, 8_000.0);
    }

    #[test]
    fn test_state_changes_published_in_order() {
        let (clock, mut transport) = transport(quiet());
        let (tx, mut rx) = create_event_channel(64);
        transport.attach_events(tx);

        record_take(&clock, &mut transport, &[], 500.0);
        transport.play().unwrap();
        transport.stop().unwrap();

        let changes: Vec<(TransportState, TransportState)> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::StateChanged { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                (TransportState::Idle, TransportState::Recording),
                (TransportState::Recording, TransportState::Idle),
                (TransportState::Idle, TransportState::Playing),
                (TransportState::Playing, TransportState::Idle),
            ]
        );
    }
}
