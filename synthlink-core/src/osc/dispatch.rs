//! Inbound OSC dispatch.
//!
//! Runs on the network thread. Each message is routed through the address
//! table and handed to one of three destinations:
//! - the real-time parameter queue (consumed by the engine's audio-side poll)
//! - the handoff state (consumed by the engine's housekeeping pass)
//! - direct host calls, or worker jobs, for operations that are safe off the
//!   audio thread
//!
//! Malformed input is dropped with a debug log and never reported to the user.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rosc::{OscMessage, OscPacket, OscType};
use synthlink_audio::EventProducer;
use synthlink_types::{with_appended_extension, ParamUpdate, SaveTarget, TuningKind, PATCH_EXTENSION};

use super::address::{resolve, AddressPath, Route};
use super::sender::OutboundLink;
use crate::defaults::UserDefaults;
use crate::handoff::HandoffState;
use crate::host::SynthHost;
use crate::paths::tuning_library_dir;
use crate::worker::WorkerHandle;

/// Argument to `tuning/path/*` that restores the bundled library directory
pub const RESET_SENTINEL: &str = "_reset";

pub struct OscDispatcher<H: SynthHost + 'static> {
    host: Arc<H>,
    params: EventProducer<ParamUpdate>,
    handoff: Arc<HandoffState>,
    defaults: UserDefaults,
    worker: WorkerHandle,
    outbound: Arc<OutboundLink>,
}

/// Join every string argument with single spaces. Non-string arguments are
/// skipped.
pub fn joined_string_args(msg: &OscMessage) -> String {
    msg.args
        .iter()
        .filter_map(|arg| match arg {
            OscType::String(s) => Some(s.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl<H: SynthHost + 'static> OscDispatcher<H> {
    pub fn new(
        host: Arc<H>,
        params: EventProducer<ParamUpdate>,
        handoff: Arc<HandoffState>,
        defaults: UserDefaults,
        worker: WorkerHandle,
        outbound: Arc<OutboundLink>,
    ) -> Self {
        Self {
            host,
            params,
            handoff,
            defaults,
            worker,
            outbound,
        }
    }

    /// Dispatch a decoded packet. Bundles are unpacked recursively and each
    /// message dispatched independently, in order.
    pub fn dispatch_packet(&mut self, packet: &OscPacket) {
        match packet {
            OscPacket::Message(msg) => self.dispatch_message(msg),
            OscPacket::Bundle(bundle) => {
                log::debug!(target: "osc::dispatch", "bundle with {} elements", bundle.content.len());
                for element in &bundle.content {
                    self.dispatch_packet(element);
                }
            }
        }
    }

    pub fn dispatch_message(&mut self, msg: &OscMessage) {
        let Some(path) = AddressPath::parse(&msg.addr) else {
            log::debug!(target: "osc::dispatch", "ignoring malformed address {:?}", msg.addr);
            return;
        };
        let Some(route) = resolve(&path) else {
            log::debug!(target: "osc::dispatch", "no route for {}", msg.addr);
            return;
        };

        match route {
            Route::Param => self.param(path.remainder(1), msg),
            Route::PatchLoad => self.patch_load(msg),
            Route::PatchSave => self.patch_save(msg),
            Route::PatchNav(nav) => self.host.navigate_patch(nav),
            Route::TuningPath(kind) => self.tuning_path(kind, msg),
            Route::TuningFile(kind) => self.tuning_file(kind, msg),
            Route::SendAllParameters => {
                let source = Arc::clone(&self.host);
                self.outbound.send_all_parameters(source);
            }
        }
    }

    fn param(&mut self, name: &str, msg: &OscMessage) {
        let Some(param) = self.host.lookup_param(name) else {
            log::debug!(target: "osc::dispatch", "no parameter with OSC address {}", msg.addr);
            return;
        };
        let value = match msg.args.first() {
            Some(OscType::Float(v)) => *v,
            other => {
                log::debug!(target: "osc::dispatch", "invalid data type for {} (not float): {:?}", msg.addr, other);
                return;
            }
        };
        self.params.push(ParamUpdate::new(param, value));
    }

    fn patch_load(&mut self, msg: &OscMessage) {
        let path = with_appended_extension(joined_string_args(msg), PATCH_EXTENSION);
        log::debug!(target: "osc::dispatch", "patch load requested: {}", path.display());
        self.handoff.request_patch_load(path);
        self.host.wake_deferred();
    }

    fn patch_save(&mut self, msg: &OscMessage) {
        let name = joined_string_args(msg);
        let target = if name.is_empty() {
            SaveTarget::Interactive
        } else {
            SaveTarget::Path(with_appended_extension(name, PATCH_EXTENSION))
        };
        let host = Arc::clone(&self.host);
        self.worker.submit(move || host.save_patch(target));
    }

    fn tuning_path(&mut self, kind: TuningKind, msg: &OscMessage) {
        let arg = joined_string_args(msg);
        let path = if arg == RESET_SENTINEL {
            tuning_library_dir(&self.host.data_path(), kind)
        } else if Path::new(&arg).exists() {
            PathBuf::from(arg)
        } else {
            self.host.report_error(
                "An OSC 'tuning/path/...' message was received with a path which does not \
                 exist: the default path will not change.",
                "Path does not exist.",
            );
            return;
        };
        log::debug!(target: "osc::dispatch", "default {} path set to {}", kind.extension(), path.display());
        self.defaults.set_path(kind, &path);
    }

    fn tuning_file(&mut self, kind: TuningKind, msg: &OscMessage) {
        let file = self.resolve_tuning_file(kind, &joined_string_args(msg));
        log::debug!(target: "osc::dispatch", "{} path: {}", kind.extension(), file.display());
        match kind {
            TuningKind::Scale => self.host.load_tuning_file(&file),
            TuningKind::Mapping => self.host.load_mapping_file(&file),
        }
    }

    /// Relative names resolve against the persisted default directory (or
    /// the bundled library); absolute paths are used as-is. The extension is
    /// always appended.
    pub fn resolve_tuning_file(&self, kind: TuningKind, name: &str) -> PathBuf {
        let name = Path::new(name);
        let base = if name.is_relative() {
            let fallback = tuning_library_dir(&self.host.data_path(), kind);
            self.defaults.path_or(kind, fallback).join(name)
        } else {
            name.to_path_buf()
        };
        with_appended_extension(base, kind.extension())
    }

    pub fn defaults(&self) -> &UserDefaults {
        &self.defaults
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }
}
