//! # synthlink-types
//!
//! Shared value types for the synthlink workspace: the raw MIDI events carried
//! through the driver-to-audio ring buffer, parameter identifiers and values
//! exchanged over OSC, and the small enums describing patch and tuning
//! operations.
//!
//! Everything that crosses a real-time boundary here is `Copy` and fixed-size.

mod midi;
mod param;
mod patch;

pub use midi::{parse_midi_message, MidiEvent, MidiEventKind};
pub use param::{ParamInfo, ParamUpdate, ParamValue};
pub use patch::{with_appended_extension, PatchNav, SaveTarget, TuningKind, PATCH_EXTENSION};

/// Index of a parameter in the active patch's parameter table.
///
/// Only meaningful while the patch it was looked up in stays loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ParamId(u32);

impl ParamId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
