//! Persisted per-user default paths (last used scale / mapping directories).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synthlink_types::TuningKind;

#[derive(Serialize, Deserialize, Default)]
struct DefaultsFile {
    #[serde(default)]
    paths: BTreeMap<String, PathBuf>,
}

/// Simple get/set store keyed by a fixed identifier per [`TuningKind`].
///
/// Backed by a TOML file when created with [`UserDefaults::load`]; every
/// `set_path` rewrites the file.
pub struct UserDefaults {
    file: Option<PathBuf>,
    values: DefaultsFile,
}

impl UserDefaults {
    /// `<config dir>/synthlink/defaults.toml`
    pub fn default_location() -> PathBuf {
        crate::paths::config_dir().join("defaults.toml")
    }

    pub fn load(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let values = match std::fs::read_to_string(&file) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                log::warn!(target: "config", "ignoring malformed defaults {}: {}", file.display(), e);
                DefaultsFile::default()
            }),
            Err(_) => DefaultsFile::default(),
        };
        Self {
            file: Some(file),
            values,
        }
    }

    /// Not persisted anywhere
    pub fn in_memory() -> Self {
        Self {
            file: None,
            values: DefaultsFile::default(),
        }
    }

    pub fn get_path(&self, kind: TuningKind) -> Option<PathBuf> {
        self.values.paths.get(kind.defaults_key()).cloned()
    }

    /// Stored value, or `fallback` when nothing was stored yet
    pub fn path_or(&self, kind: TuningKind, fallback: PathBuf) -> PathBuf {
        self.get_path(kind).unwrap_or(fallback)
    }

    pub fn set_path(&mut self, kind: TuningKind, path: &Path) {
        self.values
            .paths
            .insert(kind.defaults_key().to_string(), path.to_path_buf());
        if let Err(e) = self.save() {
            log::warn!(target: "config", "could not persist user defaults: {}", e);
        }
    }

    fn save(&self) -> std::io::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let text = toml::to_string(&self.values)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, text)
    }
}
