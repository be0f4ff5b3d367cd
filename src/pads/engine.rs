// Sound engine seam
// The transport only ever hands the engine fire-and-forget requests.

use crate::messaging::channels::TriggerProducer;
use crate::pads::PadId;
use crate::sequencer::ClickType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-pad sample loading failure (never fatal)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleLoadError {
    #[error("Sample not found: {0}")]
    Missing(String),

    #[error("Unsupported sample format: {0}")]
    Unsupported(String),

    #[error("Sound engine error: {0}")]
    Engine(String),
}

/// External sound engine contract
pub trait SoundEngine {
    /// Prepare the sound for a pad
    fn load_sample(&mut self, pad_id: PadId, source: &str) -> Result<(), SampleLoadError>;

    /// Play a pad's sound now
    fn trigger(&mut self, pad_id: PadId);

    /// Play a metronome click now
    fn click(&mut self, click: ClickType);
}

/// Immutable request crossing to the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRequest {
    Pad(PadId),
    Click(ClickType),
}

/// Sound engine front-end that forwards triggers through a lock-free SPSC queue
///
/// The audio callback owns the matching consumer and drains it every buffer.
pub struct QueuedSoundEngine {
    tx: TriggerProducer,
    base_dir: PathBuf,
    samples: BTreeMap<PadId, PathBuf>,
    dropped: u64,
}

impl QueuedSoundEngine {
    const SUPPORTED_EXTENSIONS: [&'static str; 4] = ["wav", "flac", "mp3", "ogg"];

    pub fn new(tx: TriggerProducer) -> Self {
        Self::with_base_dir(tx, PathBuf::from("."))
    }

    /// Relative sample references resolve against `base_dir`
    pub fn with_base_dir(tx: TriggerProducer, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            tx,
            base_dir: base_dir.into(),
            samples: BTreeMap::new(),
            dropped: 0,
        }
    }

    /// Resolved sample path for a pad, if it loaded
    pub fn sample_path(&self, pad_id: PadId) -> Option<&Path> {
        self.samples.get(&pad_id).map(PathBuf::as_path)
    }

    /// Requests lost because the audio thread fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn push(&mut self, request: TriggerRequest) {
        // try_push is not blocking
        if ringbuf::traits::Producer::try_push(&mut self.tx, request).is_err() {
            self.dropped += 1;
            log::warn!("Trigger queue full, {:?} dropped", request);
        }
    }
}

impl SoundEngine for QueuedSoundEngine {
    fn load_sample(&mut self, pad_id: PadId, source: &str) -> Result<(), SampleLoadError> {
        let path = self.base_dir.join(source);
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !Self::SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(SampleLoadError::Unsupported(source.to_string()));
        }
        if !path.is_file() {
            return Err(SampleLoadError::Missing(path.display().to_string()));
        }

        self.samples.insert(pad_id, path);
        Ok(())
    }

    fn trigger(&mut self, pad_id: PadId) {
        self.push(TriggerRequest::Pad(pad_id));
    }

    fn click(&mut self, click: ClickType) {
        self.push(TriggerRequest::Click(click));
    }
}
