//! OSC control surface: inbound routing and dispatch, the UDP listener, and
//! the outbound sender.
//!
//! [`OscService`] ties them together and owns the start/stop lifecycle of
//! both directions.

pub mod address;
pub mod dispatch;
pub mod listener;
pub mod sender;

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use synthlink_audio::EventProducer;
use synthlink_types::ParamUpdate;

pub use address::{resolve, AddressPath, Route, ROUTES};
pub use dispatch::{joined_string_args, OscDispatcher, RESET_SENTINEL};
pub use listener::{OscListener, PacketSource};
pub use sender::{OscSender, OscTransport, OutboundLink, SenderHandle, UdpTransport, SEND_QUEUE_CAPACITY};

use crate::defaults::UserDefaults;
use crate::handoff::HandoffState;
use crate::host::SynthHost;
use crate::worker::Worker;

pub struct OscService<H: SynthHost + 'static> {
    handoff: Arc<HandoffState>,
    outbound: Arc<OutboundLink>,
    out_host: String,
    /// Parked here while no listener is running
    dispatcher: Option<OscDispatcher<H>>,
    listener: Option<OscListener<H>>,
    sender: Option<OscSender>,
    _worker: Worker,
}

impl<H: SynthHost + 'static> OscService<H> {
    pub fn new(
        host: Arc<H>,
        params: EventProducer<ParamUpdate>,
        handoff: Arc<HandoffState>,
        defaults: UserDefaults,
        out_host: impl Into<String>,
    ) -> io::Result<Self> {
        let worker = Worker::spawn("osc-worker")?;
        let outbound = Arc::new(OutboundLink::new(Arc::clone(&handoff)));
        let dispatcher = OscDispatcher::new(
            host,
            params,
            Arc::clone(&handoff),
            defaults,
            worker.handle(),
            Arc::clone(&outbound),
        );
        Ok(Self {
            handoff,
            outbound,
            out_host: out_host.into(),
            dispatcher: Some(dispatcher),
            listener: None,
            sender: None,
            _worker: worker,
        })
    }

    /// Listen for OSC on UDP `port` on all interfaces. A running listener is
    /// stopped first. Port 0 picks a free port; the bound address is returned.
    pub fn start_listening(&mut self, port: u16) -> io::Result<SocketAddr> {
        self.stop_listening();
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        let dispatcher = self.dispatcher.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "OSC dispatcher was lost by a previous listener")
        })?;
        let listener = OscListener::spawn(socket, dispatcher, Arc::clone(&self.handoff))?;
        let addr = listener.local_addr();
        self.listener = Some(listener);
        Ok(addr)
    }

    pub fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.dispatcher = listener.stop();
        }
    }

    /// Send outbound OSC to `<osc.out_host>:port`. A running sender is
    /// replaced.
    pub fn start_sending(&mut self, port: u16) -> io::Result<SocketAddr> {
        let transport = UdpTransport::connect(&self.out_host, port)?;
        let target = transport.target();
        self.start_sending_with(transport)?;
        log::info!(target: "osc::sender", "OSC sending to {}", target);
        Ok(target)
    }

    /// Start sending through an arbitrary transport.
    pub fn start_sending_with<T: OscTransport>(&mut self, transport: T) -> io::Result<()> {
        self.stop_sending();
        let sender = OscSender::spawn(transport)?;
        self.outbound.attach(sender.handle());
        self.sender = Some(sender);
        Ok(())
    }

    pub fn stop_sending(&mut self) {
        self.outbound.detach();
        if self.sender.take().is_some() {
            log::info!(target: "osc::sender", "OSC sending stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.handoff.is_listening()
    }

    pub fn is_sending(&self) -> bool {
        self.handoff.is_sending()
    }

    /// For engine-side code that reports its own parameter changes.
    pub fn outbound(&self) -> Arc<OutboundLink> {
        Arc::clone(&self.outbound)
    }

    /// The parked dispatcher, when no listener is running.
    pub fn dispatcher_mut(&mut self) -> Option<&mut OscDispatcher<H>> {
        self.dispatcher.as_mut()
    }
}

impl<H: SynthHost + 'static> Drop for OscService<H> {
    fn drop(&mut self) {
        self.stop_listening();
        self.stop_sending();
    }
}
