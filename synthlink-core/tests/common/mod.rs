#![allow(dead_code)]
//! Test harness utilities for synthlink-core integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use rosc::{OscMessage, OscPacket, OscType};
use synthlink_audio::{event_ring, EventConsumer};
use synthlink_core::defaults::UserDefaults;
use synthlink_core::handoff::HandoffState;
use synthlink_core::osc::{OscDispatcher, OscTransport, OutboundLink};
use synthlink_core::worker::Worker;
use synthlink_core::{ParamSource, SynthHost};
use synthlink_types::{ParamId, ParamInfo, ParamUpdate, ParamValue, PatchNav, SaveTarget};

/// Every collaborator call the dispatcher made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    LoadPatch(PathBuf),
    SavePatch(SaveTarget),
    Navigate(PatchNav),
    LoadTuning(PathBuf),
    LoadMapping(PathBuf),
    Error { message: String, title: String },
    Wake,
}

pub struct RecordingHost {
    params: Mutex<Vec<ParamInfo>>,
    data_path: PathBuf,
    calls: Mutex<Vec<HostCall>>,
    save_threads: Mutex<Vec<ThreadId>>,
}

impl RecordingHost {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            params: Mutex::new(default_params()),
            data_path: data_path.into(),
            calls: Mutex::new(Vec::new()),
            save_threads: Mutex::new(Vec::new()),
        }
    }

    pub fn set_params(&self, params: Vec<ParamInfo>) {
        *self.params.lock().unwrap() = params;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Threads each `save_patch` call ran on
    pub fn save_threads(&self) -> Vec<ThreadId> {
        self.save_threads.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, HostCall::Error { .. }))
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// `a/volume` (float), `filter1/cutoff` (float), `a/octave` (int), `a/mute` (bool)
pub fn default_params() -> Vec<ParamInfo> {
    vec![
        ParamInfo::new(ParamId::new(0), "a/volume", ParamValue::Float(0.75)),
        ParamInfo::new(ParamId::new(1), "filter1/cutoff", ParamValue::Float(0.25)),
        ParamInfo::new(ParamId::new(2), "a/octave", ParamValue::Int(-1)),
        ParamInfo::new(ParamId::new(3), "a/mute", ParamValue::Bool(true)),
    ]
}

impl ParamSource for RecordingHost {
    fn param_snapshot(&self) -> Vec<ParamInfo> {
        self.params.lock().unwrap().clone()
    }
}

impl SynthHost for RecordingHost {
    fn lookup_param(&self, osc_name: &str) -> Option<ParamId> {
        self.params
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.osc_name == osc_name)
            .map(|p| p.id)
    }

    fn load_patch(&self, path: &Path) {
        self.record(HostCall::LoadPatch(path.to_path_buf()));
    }

    fn save_patch(&self, target: SaveTarget) {
        self.save_threads.lock().unwrap().push(thread::current().id());
        self.record(HostCall::SavePatch(target));
    }

    fn navigate_patch(&self, nav: PatchNav) {
        self.record(HostCall::Navigate(nav));
    }

    fn load_tuning_file(&self, path: &Path) {
        self.record(HostCall::LoadTuning(path.to_path_buf()));
    }

    fn load_mapping_file(&self, path: &Path) {
        self.record(HostCall::LoadMapping(path.to_path_buf()));
    }

    fn report_error(&self, message: &str, title: &str) {
        self.record(HostCall::Error {
            message: message.to_string(),
            title: title.to_string(),
        });
    }

    fn data_path(&self) -> PathBuf {
        self.data_path.clone()
    }

    fn wake_deferred(&self) {
        self.record(HostCall::Wake);
    }
}

/// Collects every packet handed to it.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<OscPacket>>>,
}

impl RecordingTransport {
    /// `(address, string arguments)` of every message sent so far
    pub fn messages(&self) -> Vec<(String, Vec<String>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| match p {
                OscPacket::Message(m) => Some((
                    m.addr.clone(),
                    m.args
                        .iter()
                        .filter_map(|a| match a {
                            OscType::String(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect(),
                )),
                OscPacket::Bundle(_) => None,
            })
            .collect()
    }
}

impl OscTransport for RecordingTransport {
    fn send(&mut self, packet: &OscPacket) -> io::Result<()> {
        self.sent.lock().unwrap().push(packet.clone());
        Ok(())
    }
}

/// A dispatcher wired to a recording host, with the pieces a test inspects.
pub struct Harness {
    pub host: Arc<RecordingHost>,
    pub params: EventConsumer<ParamUpdate>,
    pub handoff: Arc<HandoffState>,
    pub outbound: Arc<OutboundLink>,
    pub dispatcher: OscDispatcher<RecordingHost>,
    pub worker: Worker,
}

impl Harness {
    pub fn new(data_path: &Path, defaults: UserDefaults) -> Self {
        let host = Arc::new(RecordingHost::new(data_path));
        let (producer, params) = event_ring(64);
        let handoff = Arc::new(HandoffState::new());
        let outbound = Arc::new(OutboundLink::new(Arc::clone(&handoff)));
        let worker = Worker::spawn("test-worker").unwrap();
        let dispatcher = OscDispatcher::new(
            Arc::clone(&host),
            producer,
            Arc::clone(&handoff),
            defaults,
            worker.handle(),
            Arc::clone(&outbound),
        );
        Self {
            host,
            params,
            handoff,
            outbound,
            dispatcher,
            worker,
        }
    }

    pub fn dispatch(&mut self, addr: &str, args: Vec<OscType>) {
        self.dispatcher.dispatch_message(&msg(addr, args));
    }

    pub fn drain_params(&mut self) -> Vec<ParamUpdate> {
        let mut out = Vec::new();
        self.params.drain(|u| out.push(u));
        out
    }

    /// Let queued worker jobs finish, returning the host for inspection.
    pub fn finish(self) -> Arc<RecordingHost> {
        let host = Arc::clone(&self.host);
        drop(self.dispatcher);
        drop(self.worker);
        host
    }
}

pub fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args,
    }
}

pub fn string(s: &str) -> OscType {
    OscType::String(s.to_string())
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
