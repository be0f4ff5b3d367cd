// BeatPad - Library exports for tests and the demo binary

pub mod messaging;
pub mod pads;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use messaging::channels::{create_event_channel, create_trigger_channel};
pub use pads::engine::{QueuedSoundEngine, SampleLoadError, SoundEngine, TriggerRequest};
pub use pads::kit::{KitError, PadKit};
pub use pads::{Pad, PadId};
pub use sequencer::{
    BarBeat, ClickType, Clock, ManualClock, Metronome, PadHit, Pattern, PatternStore,
    Quantization, SequencerError, SequencerResult, SystemClock, Tempo, TimeSignature, Transport,
    TransportConfig, TransportEvent, TransportSnapshot, TransportState, TriggerSource, quantize,
};
