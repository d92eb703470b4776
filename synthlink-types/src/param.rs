use serde::{Deserialize, Serialize};

use crate::ParamId;

/// A parameter's current value, tagged with its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl ParamValue {
    pub fn to_f32(&self) -> f32 {
        match self {
            ParamValue::Float(v) => *v,
            ParamValue::Int(v) => *v as f32,
            ParamValue::Bool(v) => if *v { 1.0 } else { 0.0 },
        }
    }

    /// Re-type a raw float (as received over OSC) to match this value's type.
    pub fn with_f32(&self, value: f32) -> ParamValue {
        match self {
            ParamValue::Float(_) => ParamValue::Float(value),
            ParamValue::Int(_) => ParamValue::Int(value.round() as i32),
            ParamValue::Bool(_) => ParamValue::Bool(value > 0.5),
        }
    }

    /// Text form used for outbound OSC: integers as decimal, booleans as
    /// `0`/`1`, floats with six fractional digits.
    pub fn to_osc_string(&self) -> String {
        match self {
            ParamValue::Float(v) => format!("{:.6}", v),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        }
    }
}

/// Snapshot of one parameter of the active patch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub id: ParamId,
    /// OSC-visible name, relative to the `/param/` prefix (e.g. `a/filter1/cutoff`)
    pub osc_name: String,
    pub value: ParamValue,
}

impl ParamInfo {
    pub fn new(id: ParamId, osc_name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            id,
            osc_name: osc_name.into(),
            value,
        }
    }

    /// Full outbound address for this parameter
    pub fn osc_address(&self) -> String {
        format!("/param/{}", self.osc_name)
    }
}

/// A real-time parameter change, queued from the network thread to the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    pub param: ParamId,
    pub value: f32,
}

impl ParamUpdate {
    pub fn new(param: ParamId, value: f32) -> Self {
        Self { param, value }
    }
}
