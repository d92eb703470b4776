use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extension appended to patch names received over OSC.
pub const PATCH_EXTENSION: &str = "fxp";

/// Non-real-time patch browsing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchNav {
    Random,
    Next,
    Previous,
    NextCategory,
    PreviousCategory,
}

/// Where a patch save should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Host decides (dialog or default location)
    Interactive,
    Path(PathBuf),
}

/// Scale (`.scl`) versus keyboard mapping (`.kbm`) files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuningKind {
    Scale,
    Mapping,
}

impl TuningKind {
    pub fn extension(self) -> &'static str {
        match self {
            TuningKind::Scale => "scl",
            TuningKind::Mapping => "kbm",
        }
    }

    /// Directory under the data path holding the bundled files of this kind.
    pub fn library_subdir(self) -> &'static str {
        match self {
            TuningKind::Scale => "SCL",
            TuningKind::Mapping => "KBM Concert Pitch",
        }
    }

    /// Key under which the user's default directory is persisted.
    pub fn defaults_key(self) -> &'static str {
        match self {
            TuningKind::Scale => "last_scl_path",
            TuningKind::Mapping => "last_kbm_path",
        }
    }
}

/// Append `.ext` to a path without replacing an existing extension
/// (`My.Patch` becomes `My.Patch.fxp`).
pub fn with_appended_extension(path: impl AsRef<Path>, ext: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_ref().as_os_str());
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}
