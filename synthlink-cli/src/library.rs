//! Factory/user patch library scanned from `<data>/patches/<category>/*.fxp`.

use std::path::{Path, PathBuf};

use synthlink_types::{PatchNav, PATCH_EXTENSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    pub category: String,
    pub path: PathBuf,
}

/// Patches ordered by category, then file name.
pub struct PatchLibrary {
    entries: Vec<PatchEntry>,
    rng_state: u64,
}

impl PatchLibrary {
    pub fn scan(patches_dir: &Path) -> Self {
        let mut entries = Vec::new();
        let categories = match std::fs::read_dir(patches_dir) {
            Ok(rd) => rd,
            Err(e) => {
                log::debug!("no patch library at {}: {}", patches_dir.display(), e);
                return Self::from_entries(entries);
            }
        };
        for category in categories.flatten() {
            let dir = category.path();
            if !dir.is_dir() {
                continue;
            }
            let name = category.file_name().to_string_lossy().into_owned();
            let Ok(files) = std::fs::read_dir(&dir) else {
                continue;
            };
            for file in files.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) == Some(PATCH_EXTENSION) {
                    entries.push(PatchEntry {
                        category: name.clone(),
                        path,
                    });
                }
            }
        }
        entries.sort_by(|a, b| (&a.category, &a.path).cmp(&(&b.category, &b.path)));
        log::info!("patch library: {} patches in {}", entries.len(), patches_dir.display());
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<PatchEntry>) -> Self {
        Self {
            entries,
            rng_state: 0x853c_49e6_748f_ea9b,
        }
    }

    fn position(&self, current: Option<&Path>) -> Option<usize> {
        let current = current?;
        self.entries.iter().position(|e| e.path.as_path() == current)
    }

    fn next_random(&mut self) -> u64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.rng_state >> 33
    }

    /// Pick the patch `nav` leads to from `current`. Wraps at both ends.
    /// `None` only when the library is empty.
    pub fn step(&mut self, nav: PatchNav, current: Option<&Path>) -> Option<&PatchEntry> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let pos = self.position(current);
        let index = match nav {
            PatchNav::Next => pos.map_or(0, |i| (i + 1) % len),
            PatchNav::Previous => pos.map_or(len - 1, |i| (i + len - 1) % len),
            PatchNav::Random => {
                let mut pick = (self.next_random() % len as u64) as usize;
                if len > 1 && Some(pick) == pos {
                    pick = (pick + 1) % len;
                }
                pick
            }
            PatchNav::NextCategory => self.category_start(pos, true),
            PatchNav::PreviousCategory => self.category_start(pos, false),
        };
        self.entries.get(index)
    }

    /// First patch of the category after (or before) the one at `pos`.
    fn category_start(&self, pos: Option<usize>, forward: bool) -> usize {
        let mut starts: Vec<usize> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i == 0 || self.entries[i - 1].category != entry.category {
                starts.push(i);
            }
        }
        let Some(pos) = pos else {
            return if forward { 0 } else { starts[starts.len() - 1] };
        };
        let current = starts.iter().rposition(|&s| s <= pos).unwrap_or(0);
        let target = if forward {
            (current + 1) % starts.len()
        } else {
            (current + starts.len() - 1) % starts.len()
        };
        starts[target]
    }
}
