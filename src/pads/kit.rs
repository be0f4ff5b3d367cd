// Pad kit - Pad layout persistence and sample loading
// Kits are JSON files; a failed sample never aborts loading the rest.

use crate::pads::engine::{SampleLoadError, SoundEngine};
use crate::pads::{Pad, PadId, default_pads};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Kit file errors
#[derive(Debug, thiserror::Error)]
pub enum KitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid kit: {0}")]
    Invalid(String),
}

/// Serializable pad layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadKit {
    pub name: String,
    pub version: String,
    pub pads: Vec<Pad>,
}

/// Outcome of loading every pad's sample; failures never abort the batch
#[derive(Debug, Default)]
pub struct SampleLoadReport {
    pub loaded: Vec<PadId>,
    pub failed: BTreeMap<PadId, SampleLoadError>,
}

impl SampleLoadReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl PadKit {
    /// Create a new empty kit
    pub fn new(name: String) -> Self {
        Self {
            name,
            version: "1.0".to_string(),
            pads: Vec::new(),
        }
    }

    /// Create the built-in 16 pad kit
    pub fn default_kit() -> Self {
        Self {
            pads: default_pads(),
            ..Self::new("Default Kit".to_string())
        }
    }

    /// Get pad by id
    pub fn pad(&self, pad_id: PadId) -> Option<&Pad> {
        self.pads.iter().find(|p| p.id == pad_id)
    }

    /// Get pad bound to a keyboard key
    pub fn pad_for_key(&self, key: char) -> Option<&Pad> {
        self.pads.iter().find(|p| p.matches_key(key))
    }

    pub fn contains(&self, pad_id: PadId) -> bool {
        self.pad(pad_id).is_some()
    }

    /// Reject duplicate ids or key bindings
    pub fn validate(&self) -> Result<(), KitError> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();

        for pad in &self.pads {
            if !ids.insert(pad.id) {
                return Err(KitError::Invalid(format!("duplicate {}", pad.id)));
            }
            if !keys.insert(pad.key.to_lowercase().collect::<String>()) {
                return Err(KitError::Invalid(format!(
                    "key '{}' is bound to more than one pad",
                    pad.key
                )));
            }
        }

        Ok(())
    }

    /// Save kit to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), KitError> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)?;
        Ok(())
    }

    /// Load kit from JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, KitError> {
        let json_str = std::fs::read_to_string(path)?;
        let kit: Self = serde_json::from_str(&json_str)?;
        kit.validate()?;
        Ok(kit)
    }

    /// Ask the engine to load every pad's sound
    pub fn load_samples<E: SoundEngine + ?Sized>(&self, engine: &mut E) -> SampleLoadReport {
        let mut report = SampleLoadReport::default();

        for pad in &self.pads {
            match engine.load_sample(pad.id, &pad.sound) {
                Ok(()) => report.loaded.push(pad.id),
                Err(e) => {
                    log::warn!("Failed to load sample for {} ({}): {}", pad.id, pad.name, e);
                    report.failed.insert(pad.id, e);
                }
            }
        }

        report
    }
}

impl Default for PadKit {
    fn default() -> Self {
        Self::default_kit()
    }
}
