// Pads - the sixteen triggerable sound slots

pub mod engine;
pub mod kit;

pub use engine::{QueuedSoundEngine, SampleLoadError, SoundEngine, TriggerRequest};
pub use kit::{KitError, PadKit};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Pad identifier (1-based in the default kit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadId(pub u8);

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad {}", self.0)
    }
}

/// A pad definition: immutable once the kit is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pad {
    pub id: PadId,
    /// Display name
    pub name: String,
    /// Keyboard trigger
    pub key: char,
    /// Sound reference handed to the sound engine (path or URL)
    pub sound: String,
}

impl Pad {
    pub fn new(id: u8, name: &str, key: char, sound: &str) -> Self {
        Self {
            id: PadId(id),
            name: name.to_string(),
            key,
            sound: sound.to_string(),
        }
    }

    /// Case-insensitive key match
    pub fn matches_key(&self, key: char) -> bool {
        self.key.to_lowercase().eq(key.to_lowercase())
    }
}

/// The default 4x4 layout
pub fn default_pads() -> Vec<Pad> {
    vec![
        Pad::new(1, "Kick", 'Q', "samples/kick.wav"),
        Pad::new(2, "Snare", 'W', "samples/snare.wav"),
        Pad::new(3, "Clap", 'E', "samples/clap.wav"),
        Pad::new(4, "HiHat", 'R', "samples/hihat.wav"),
        Pad::new(5, "Tom 1", 'A', "samples/tom1.wav"),
        Pad::new(6, "Tom 2", 'S', "samples/tom2.wav"),
        Pad::new(7, "Cymbal", 'D', "samples/cymbal.wav"),
        Pad::new(8, "Perc", 'F', "samples/perc.wav"),
        Pad::new(9, "Kick 2", 'Z', "samples/kick2.wav"),
        Pad::new(10, "Snare 2", 'X', "samples/snare2.wav"),
        Pad::new(11, "Clap 2", 'C', "samples/clap2.wav"),
        Pad::new(12, "HiHat 2", 'V', "samples/hihat2.wav"),
        Pad::new(13, "Tom 3", 'B', "samples/tom3.wav"),
        Pad::new(14, "Tom 4", 'N', "samples/tom4.wav"),
        Pad::new(15, "Cymbal 2", 'M', "samples/cymbal2.wav"),
        Pad::new(16, "Perc 2", ',', "samples/perc2.wav"),
    ]
}

/// Last-trigger bookkeeping for the pad highlight
///
/// A pad counts as active for [`PadActivity::ACTIVE_WINDOW_MS`] after its most
/// recent trigger; nothing is timed separately.
#[derive(Debug, Clone, Default)]
pub struct PadActivity {
    last_trigger_ms: HashMap<PadId, f64>,
}

impl PadActivity {
    pub const ACTIVE_WINDOW_MS: f64 = 100.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pad_id: PadId, now_ms: f64) {
        self.last_trigger_ms.insert(pad_id, now_ms);
    }

    pub fn is_active(&self, pad_id: PadId, now_ms: f64) -> bool {
        self.last_trigger_ms
            .get(&pad_id)
            .is_some_and(|&last| is_active_since(last, now_ms))
    }

    /// Every pad currently lit, sorted by id
    pub fn active_pads(&self, now_ms: f64) -> Vec<PadId> {
        let mut active: Vec<PadId> = self
            .last_trigger_ms
            .iter()
            .filter(|&(_, &last)| is_active_since(last, now_ms))
            .map(|(&pad_id, _)| pad_id)
            .collect();
        active.sort();
        active
    }

    pub fn clear(&mut self) {
        self.last_trigger_ms.clear();
    }
}

fn is_active_since(last_trigger_ms: f64, now_ms: f64) -> bool {
    let age = now_ms - last_trigger_ms;
    (0.0..PadActivity::ACTIVE_WINDOW_MS).contains(&age)
}
