// Sequencer module
// Pattern recording, quantization and the playback transport

pub mod clock;
pub mod config;
pub mod count_in;
pub mod metronome;
pub mod pattern;
pub mod quantize;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Quantization, TransportConfig};
pub use count_in::CountIn;
pub use metronome::{ClickType, Metronome};
pub use pattern::{PadHit, Pattern, PatternStore};
pub use quantize::quantize;
pub use scheduler::{TaskAction, TaskHandle, TimerArena};
pub use timeline::{BarBeat, Tempo, TimeSignature};
pub use transport::{
    Transport, TransportEvent, TransportSnapshot, TransportState, TriggerSource,
};

use crate::pads::PadId;
use thiserror::Error;

/// Errors surfaced synchronously to the caller of a sequencer command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Command `{command}` is not allowed while {state:?}")]
    InvalidTransportState {
        command: &'static str,
        state: TransportState,
    },

    #[error("Unknown pad: {0}")]
    UnknownPad(PadId),
}

pub type SequencerResult<T> = Result<T, SequencerError>;
