//! Control-side engine interface.
//!
//! `SynthHost` is what the OSC layer and the housekeeping pass call into. All
//! of it runs off the audio thread: on the network thread, the worker thread,
//! the outbound sender thread or the message loop. The audio-thread half of
//! an engine is [`synthlink_audio::BlockEngine`].

use std::path::{Path, PathBuf};

use synthlink_types::{ParamId, ParamInfo, PatchNav, SaveTarget};

/// Live view of the active patch's parameters.
pub trait ParamSource: Send + Sync {
    /// Every parameter of the active patch, in table order. Taken live: a
    /// concurrent patch reload may or may not be reflected.
    fn param_snapshot(&self) -> Vec<ParamInfo>;
}

pub trait SynthHost: ParamSource {
    /// Resolve a name relative to `/param/` (e.g. `a/filter1/cutoff`).
    fn lookup_param(&self, osc_name: &str) -> Option<ParamId>;

    /// Load a patch file. Called from the housekeeping pass.
    fn load_patch(&self, path: &Path);

    fn save_patch(&self, target: SaveTarget);

    fn navigate_patch(&self, nav: PatchNav);

    fn load_tuning_file(&self, path: &Path);

    fn load_mapping_file(&self, path: &Path);

    /// Surface an error to the user.
    fn report_error(&self, message: &str, title: &str);

    /// Root of the bundled data (tuning library, factory patches).
    fn data_path(&self) -> PathBuf;

    /// Deferred work was queued in the handoff state; run housekeeping soon.
    fn wake_deferred(&self) {}
}
