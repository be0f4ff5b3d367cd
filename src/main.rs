use beatpad::messaging::{EventConsumer, TriggerConsumer};
use beatpad::{
    Clock, PadId, PadKit, QueuedSoundEngine, SystemClock, Transport, TransportConfig, TransportEvent,
    TransportState, TriggerRequest, create_event_channel, create_trigger_channel,
};
use ringbuf::traits::Consumer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// Ringbuffer capacity constants
// A dense 16th-note pattern on every pad at 240 BPM is ~260 triggers/second;
// 256 slots cover a second of backlog if the audio side stalls.
const TRIGGER_RINGBUFFER_CAPACITY: usize = 256;
const EVENT_RINGBUFFER_CAPACITY: usize = 512;

// Control loop resolution while waiting on timers
const MAX_IDLE_SLEEP_MS: f64 = 5.0;

/// Scripted performance: (pad, ms after recording starts)
const PERFORMANCE: [(u8, f64); 8] = [
    (1, 0.0),
    (4, 240.0),
    (2, 510.0),
    (4, 740.0),
    (1, 1010.0),
    (1, 1260.0),
    (2, 1490.0),
    (4, 1760.0),
];
const TAKE_LENGTH_MS: f64 = 2000.0;
const PLAYBACK_CYCLES: u64 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== BeatPad ===");
    println!("Headless demo - record a take, then loop it\n");

    let mut args = std::env::args().skip(1);
    let kit = match args.next() {
        Some(path) => match PadKit::load_from_file(&path) {
            Ok(kit) => kit,
            Err(e) => {
                eprintln!("ERROR: could not load kit {}: {}", path, e);
                return;
            }
        },
        None => PadKit::default_kit(),
    };
    let samples_dir = args.next().unwrap_or_else(|| ".".to_string());

    let (trigger_tx, trigger_rx) = create_trigger_channel(TRIGGER_RINGBUFFER_CAPACITY);
    let (event_tx, mut event_rx) = create_event_channel(EVENT_RINGBUFFER_CAPACITY);

    // Stand-in for the audio callback: drains the trigger queue
    let running = Arc::new(AtomicBool::new(true));
    let audio_thread = {
        let running = running.clone();
        thread::spawn(move || drain_triggers(trigger_rx, running))
    };

    let engine = QueuedSoundEngine::with_base_dir(trigger_tx, samples_dir);
    let config = TransportConfig {
        looping: true,
        ..TransportConfig::default()
    };
    let mut transport = Transport::with_config(SystemClock::new(), engine, kit, config);
    transport.attach_events(event_tx);

    let report = transport.load_samples();
    println!(
        "Samples: {} loaded, {} unavailable",
        report.loaded.len(),
        report.failed.len()
    );

    if let Err(e) = run_demo(&mut transport, &mut event_rx) {
        eprintln!("ERROR: {}", e);
    }

    running.store(false, Ordering::Relaxed);
    if audio_thread.join().is_err() {
        eprintln!("ERROR: audio thread panicked");
    }

    println!(
        "\nDone ({} triggers dropped, {} events dropped)",
        transport.engine().dropped(),
        transport.dropped_events()
    );
}

fn run_demo(
    transport: &mut Transport<SystemClock, QueuedSoundEngine>,
    events: &mut EventConsumer,
) -> beatpad::SequencerResult<()> {
    println!("\nRecording...");
    transport.record()?;
    let start = transport.clock().now_ms();
    for (pad, at) in PERFORMANCE {
        wait_until(transport, events, start + at);
        transport.press_pad(PadId(pad))?;
    }
    wait_until(transport, events, start + TAKE_LENGTH_MS);
    transport.stop_recording()?;

    if let Some(pattern) = transport.pattern() {
        println!(
            "Recorded {} hits over {:.0}ms",
            pattern.hit_count(),
            pattern.duration_ms()
        );
        for hit in pattern.hits_by_time() {
            println!("  {:>7.1}ms  {}", hit.timestamp_ms, hit.pad_id);
        }
    }

    println!("\nPlaying {} cycles...", PLAYBACK_CYCLES);
    transport.play()?;
    while transport.state() == TransportState::Playing
        && transport.snapshot().cycle < PLAYBACK_CYCLES
    {
        let next = transport.next_due_ms().unwrap_or(transport.clock().now_ms());
        wait_until(transport, events, next);
    }
    transport.stop()?;
    drain_events(events);
    Ok(())
}

/// Poll the transport until the clock reaches `target_ms`
fn wait_until(
    transport: &mut Transport<SystemClock, QueuedSoundEngine>,
    events: &mut EventConsumer,
    target_ms: f64,
) {
    loop {
        transport.poll();
        drain_events(events);

        let now = transport.clock().now_ms();
        if now >= target_ms {
            return;
        }
        let next = transport.next_due_ms().unwrap_or(target_ms).min(target_ms);
        let sleep_ms = (next - now).clamp(0.0, MAX_IDLE_SLEEP_MS);
        thread::sleep(Duration::from_secs_f64(sleep_ms / 1000.0));
    }
}

fn drain_events(events: &mut EventConsumer) {
    while let Some(event) = events.try_pop() {
        match event {
            TransportEvent::StateChanged { from, to } => {
                println!("[transport] {:?} -> {:?}", from, to)
            }
            TransportEvent::CycleStarted { cycle, at_ms } => {
                println!("[transport] cycle {} at {:.0}ms", cycle, at_ms)
            }
            TransportEvent::Notification(n) => println!("[{:?}] {}", n.level, n.message),
            other => log::trace!("{:?}", other),
        }
    }
}

fn drain_triggers(mut rx: TriggerConsumer, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        while let Some(request) = rx.try_pop() {
            match request {
                TriggerRequest::Pad(pad_id) => log::info!("trigger {}", pad_id),
                TriggerRequest::Click(click) => log::debug!("click {:?}", click),
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}
