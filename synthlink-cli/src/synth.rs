//! Reference engine behind the `synthlink` binary.
//!
//! A fixed parameter table with atomic values, a host that loads and saves
//! patches as TOML parameter maps, and a monophonic sine voice. The table is
//! shared: the network thread reads it for lookups and dumps, the audio
//! thread writes OSC updates into it, the housekeeping pass overwrites it on
//! patch load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use synthlink_audio::{BlockEngine, EventConsumer};
use synthlink_core::{ParamSource, SynthHost};
use synthlink_types::{
    MidiEvent, MidiEventKind, ParamId, ParamInfo, ParamUpdate, ParamValue, PatchNav, SaveTarget,
    PATCH_EXTENSION,
};

use crate::library::PatchLibrary;

/// Frames per synthesis step
pub const BLOCK_SIZE: usize = 32;

const VOLUME: ParamId = ParamId::new(0);
const PITCH: ParamId = ParamId::new(1);
const OCTAVE: ParamId = ParamId::new(2);
const ATTACK: ParamId = ParamId::new(3);
const RELEASE: ParamId = ParamId::new(4);
const CUTOFF: ParamId = ParamId::new(5);
const MUTE: ParamId = ParamId::new(6);

/// Name and default of every parameter, in table order.
const LAYOUT: &[(&str, ParamValue)] = &[
    ("a/volume", ParamValue::Float(0.7)),
    ("a/osc1/pitch", ParamValue::Float(0.0)),
    ("a/osc1/octave", ParamValue::Int(0)),
    ("a/amp/attack", ParamValue::Float(0.01)),
    ("a/amp/release", ParamValue::Float(0.25)),
    ("filter1/cutoff", ParamValue::Float(1.0)),
    ("a/mute", ParamValue::Bool(false)),
];

struct ParamSlot {
    osc_name: &'static str,
    default: ParamValue,
    bits: AtomicU32,
}

/// Lock-free parameter storage. Values are kept as `f32` bits and re-typed
/// on read.
pub struct ParamTable {
    slots: Vec<ParamSlot>,
}

impl ParamTable {
    pub fn new() -> Self {
        let slots = LAYOUT
            .iter()
            .map(|&(osc_name, default)| ParamSlot {
                osc_name,
                default,
                bits: AtomicU32::new(default.to_f32().to_bits()),
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn lookup(&self, osc_name: &str) -> Option<ParamId> {
        self.slots
            .iter()
            .position(|s| s.osc_name == osc_name)
            .map(|i| ParamId::new(i as u32))
    }

    /// Typed value; out-of-range ids read as 0.
    pub fn value(&self, id: ParamId) -> ParamValue {
        match self.slots.get(id.index()) {
            Some(slot) => slot
                .default
                .with_f32(f32::from_bits(slot.bits.load(Ordering::Relaxed))),
            None => ParamValue::Float(0.0),
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.value(id).to_f32()
    }

    /// Store a raw value, coerced to the parameter's type. Unknown ids and
    /// non-finite values are ignored.
    pub fn set(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }
        if let Some(slot) = self.slots.get(id.index()) {
            let typed = slot.default.with_f32(value).to_f32();
            slot.bits.store(typed.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.bits.store(slot.default.to_f32().to_bits(), Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Vec<ParamInfo> {
        (0..self.len())
            .map(|i| {
                let id = ParamId::new(i as u32);
                ParamInfo::new(id, self.slots[i].osc_name, self.value(id))
            })
            .collect()
    }

    fn to_patch_map(&self) -> BTreeMap<String, f32> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.osc_name.to_string(), self.get(ParamId::new(i as u32))))
            .collect()
    }

    /// Reset to defaults, then apply every known entry. Unknown names are
    /// skipped.
    fn apply_patch_map(&self, map: &BTreeMap<String, f32>) {
        self.reset();
        for (name, value) in map {
            match self.lookup(name) {
                Some(id) => self.set(id, *value),
                None => log::debug!("patch references unknown parameter {}", name),
            }
        }
    }
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk patch: a TOML map of parameter name to value.
#[derive(Serialize, Deserialize, Default)]
struct PatchFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    params: BTreeMap<String, f32>,
}

#[derive(Default)]
struct HostState {
    current_patch: Option<PathBuf>,
    scale_file: Option<PathBuf>,
    mapping_file: Option<PathBuf>,
}

/// Control-side half of the reference engine.
pub struct ReferenceHost {
    table: Arc<ParamTable>,
    data_path: PathBuf,
    library: Mutex<PatchLibrary>,
    state: Mutex<HostState>,
    wake: Option<Sender<()>>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ReferenceHost {
    pub fn new(table: Arc<ParamTable>, data_path: PathBuf, wake: Option<Sender<()>>) -> Self {
        let library = PatchLibrary::scan(&data_path.join("patches"));
        Self {
            table,
            data_path,
            library: Mutex::new(library),
            state: Mutex::new(HostState::default()),
            wake,
        }
    }

    pub fn table(&self) -> &Arc<ParamTable> {
        &self.table
    }

    pub fn current_patch(&self) -> Option<PathBuf> {
        locked(&self.state).current_patch.clone()
    }

    fn user_patch_dir(&self) -> PathBuf {
        self.data_path.join("patches").join("User")
    }

    fn try_load(&self, path: &Path) -> Result<(), String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let patch: PatchFile = toml::from_str(&text).map_err(|e| e.to_string())?;
        self.table.apply_patch_map(&patch.params);
        locked(&self.state).current_patch = Some(path.to_path_buf());
        Ok(())
    }

    fn try_save(&self, path: &Path) -> Result<(), String> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let patch = PatchFile {
            name,
            params: self.table.to_patch_map(),
        };
        let text = toml::to_string(&patch).map_err(|e| e.to_string())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(path, text).map_err(|e| e.to_string())?;
        locked(&self.state).current_patch = Some(path.to_path_buf());
        Ok(())
    }

    fn check_tuning_file(&self, path: &Path, what: &str) -> bool {
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => true,
            Ok(_) => {
                self.report_error(&format!("The {} file {} is empty.", what, path.display()), "Tuning error");
                false
            }
            Err(e) => {
                self.report_error(
                    &format!("Unable to read {} file {}: {}", what, path.display(), e),
                    "Tuning error",
                );
                false
            }
        }
    }
}

impl ParamSource for ReferenceHost {
    fn param_snapshot(&self) -> Vec<ParamInfo> {
        self.table.snapshot()
    }
}

impl SynthHost for ReferenceHost {
    fn lookup_param(&self, osc_name: &str) -> Option<ParamId> {
        self.table.lookup(osc_name)
    }

    fn load_patch(&self, path: &Path) {
        match self.try_load(path) {
            Ok(()) => log::info!("Loaded patch {}", path.display()),
            Err(e) => log::error!("Unable to load patch {}: {}", path.display(), e),
        }
    }

    fn save_patch(&self, target: SaveTarget) {
        let path = match target {
            SaveTarget::Path(path) => path,
            SaveTarget::Interactive => self.current_patch().unwrap_or_else(|| {
                self.user_patch_dir()
                    .join(format!("Untitled.{}", PATCH_EXTENSION))
            }),
        };
        match self.try_save(&path) {
            Ok(()) => log::info!("Saved patch {}", path.display()),
            Err(e) => self.report_error(
                &format!("Unable to save patch {}: {}", path.display(), e),
                "Save error",
            ),
        }
    }

    fn navigate_patch(&self, nav: PatchNav) {
        let current = self.current_patch();
        let next = locked(&self.library)
            .step(nav, current.as_deref())
            .map(|entry| entry.path.clone());
        match next {
            Some(path) => self.load_patch(&path),
            None => log::info!("No patches in library, ignoring {:?}", nav),
        }
    }

    fn load_tuning_file(&self, path: &Path) {
        if self.check_tuning_file(path, "scale") {
            log::info!("Scale file {}", path.display());
            locked(&self.state).scale_file = Some(path.to_path_buf());
        }
    }

    fn load_mapping_file(&self, path: &Path) {
        if self.check_tuning_file(path, "keyboard mapping") {
            log::info!("Keyboard mapping file {}", path.display());
            locked(&self.state).mapping_file = Some(path.to_path_buf());
        }
    }

    fn report_error(&self, message: &str, title: &str) {
        log::error!("{}: {}", title, message);
    }

    fn data_path(&self) -> PathBuf {
        self.data_path.clone()
    }

    fn wake_deferred(&self) {
        if let Some(wake) = &self.wake {
            let _ = wake.try_send(());
        }
    }
}

/// Audio-thread half of the reference engine: one sine voice with a linear
/// attack/release envelope and a one-pole lowpass.
pub struct ReferenceVoice {
    table: Arc<ParamTable>,
    params: EventConsumer<ParamUpdate>,
    sample_rate: f32,
    left: [f32; BLOCK_SIZE],
    right: [f32; BLOCK_SIZE],
    note: Option<u8>,
    velocity: f32,
    gate: bool,
    env: f32,
    phase: f32,
    lowpass: f32,
}

impl ReferenceVoice {
    pub fn new(table: Arc<ParamTable>, params: EventConsumer<ParamUpdate>, sample_rate: f32) -> Self {
        Self {
            table,
            params,
            sample_rate,
            left: [0.0; BLOCK_SIZE],
            right: [0.0; BLOCK_SIZE],
            note: None,
            velocity: 0.0,
            gate: false,
            env: 0.0,
            phase: 0.0,
            lowpass: 0.0,
        }
    }

    fn frequency(&self, note: u8) -> f32 {
        let semis = note as f32 - 69.0 + self.table.get(PITCH) + 12.0 * self.table.get(OCTAVE);
        440.0 * (semis / 12.0).exp2()
    }
}

impl BlockEngine for ReferenceVoice {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn poll_control(&mut self) {
        let table = &self.table;
        self.params.drain(|update| table.set(update.param, update.value));
    }

    fn apply_midi(&mut self, event: &MidiEvent) {
        match event.kind() {
            Some(MidiEventKind::NoteOn { note, velocity, .. }) => {
                self.note = Some(note);
                self.velocity = velocity as f32 / 127.0;
                self.gate = true;
            }
            Some(MidiEventKind::NoteOff { note, .. }) if self.note == Some(note) => {
                self.gate = false;
            }
            _ => {}
        }
    }

    fn synthesize_block(&mut self) {
        let Some(note) = self.note else {
            self.left = [0.0; BLOCK_SIZE];
            self.right = [0.0; BLOCK_SIZE];
            return;
        };

        let sr = self.sample_rate.max(1.0);
        let step = self.frequency(note) / sr;
        let attack = 1.0 / (self.table.get(ATTACK).max(0.001) * sr);
        let release = 1.0 / (self.table.get(RELEASE).max(0.001) * sr);
        let cutoff = self.table.get(CUTOFF).clamp(0.0, 1.0);
        let coeff = cutoff * cutoff;
        let gain = if self.table.value(MUTE) == ParamValue::Bool(true) {
            0.0
        } else {
            self.table.get(VOLUME).clamp(0.0, 1.0) * self.velocity
        };

        for i in 0..BLOCK_SIZE {
            self.env = if self.gate {
                (self.env + attack).min(1.0)
            } else {
                (self.env - release).max(0.0)
            };
            let raw = (self.phase * std::f32::consts::TAU).sin();
            self.lowpass += coeff * (raw - self.lowpass);
            let sample = self.lowpass * self.env * gain;
            self.left[i] = sample;
            self.right[i] = sample;
            self.phase = (self.phase + step).fract();
        }

        if !self.gate && self.env <= 0.0 {
            self.note = None;
        }
    }

    fn output(&self) -> (&[f32], &[f32]) {
        (&self.left, &self.right)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}
