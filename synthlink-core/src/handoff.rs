//! State the network/control thread shares with the engine.
//!
//! Exactly three fields, each with its own discipline: two atomic feature
//! flags and one mutex-guarded pending patch-load slot. The mutex is only
//! held to copy a path in or out, never across I/O, and is never touched from
//! sample-producing code.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::host::SynthHost;

#[derive(Default)]
pub struct HandoffState {
    listening: AtomicBool,
    sending: AtomicBool,
    pending_patch: Mutex<Option<PathBuf>>,
}

impl HandoffState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn set_listening(&self, on: bool) {
        self.listening.store(on, Ordering::Release);
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn set_sending(&self, on: bool) {
        self.sending.store(on, Ordering::Release);
    }

    fn slot(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.pending_patch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a patch-load request. An unconsumed earlier request is replaced.
    pub fn request_patch_load(&self, path: PathBuf) {
        let replaced = self.slot().replace(path);
        if let Some(old) = replaced {
            log::debug!(target: "handoff", "patch load {} superseded before it ran", old.display());
        }
    }

    /// Take the pending request, leaving the slot empty.
    pub fn take_patch_load(&self) -> Option<PathBuf> {
        self.slot().take()
    }

    pub fn has_pending_patch_load(&self) -> bool {
        self.slot().is_some()
    }
}

/// Engine housekeeping pass: apply whatever deferred work the control thread
/// left behind. Runs outside the real-time path. Returns true if a patch was
/// loaded.
pub fn run_housekeeping<H: SynthHost + ?Sized>(handoff: &HandoffState, host: &H) -> bool {
    match handoff.take_patch_load() {
        Some(path) => {
            load_requested_patch(host, &path);
            true
        }
        None => false,
    }
}

fn load_requested_patch<H: SynthHost + ?Sized>(host: &H, path: &Path) {
    log::info!(target: "handoff", "loading patch {}", path.display());
    host.load_patch(path);
}
