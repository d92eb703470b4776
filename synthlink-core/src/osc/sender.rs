//! Dedicated OSC send thread.
//!
//! Outbound messages are pushed onto a bounded channel and transmitted by the
//! single thread that owns the socket, so callers never touch UDP directly.
//! Messages queued from one thread go out in the order they were queued.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use rosc::{OscMessage, OscPacket, OscType};

use crate::handoff::HandoffState;
use crate::host::ParamSource;

/// Channel capacity for the outbound queue. A full queue drops the message.
pub const SEND_QUEUE_CAPACITY: usize = 1024;

/// Where encoded packets go. UDP in production; tests record packets instead.
pub trait OscTransport: Send + 'static {
    fn send(&mut self, packet: &OscPacket) -> io::Result<()>;
}

pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local socket aimed at `host:port`.
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("cannot resolve {}", host))
        })?;
        let bind_addr: SocketAddr = if target.is_ipv6() {
            "[::]:0".parse().map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?
        } else {
            "0.0.0.0:0".parse().map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?
        };
        let socket = UdpSocket::bind(bind_addr)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl OscTransport for UdpTransport {
    fn send(&mut self, packet: &OscPacket) -> io::Result<()> {
        let bytes = rosc::encoder::encode(packet)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))?;
        self.socket.send_to(&bytes, self.target)?;
        Ok(())
    }
}

enum Outbound {
    Message { addr: String, value: String },
    Dump(Arc<dyn ParamSource>),
    Shutdown,
}

fn string_message(addr: String, value: String) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr,
        args: vec![OscType::String(value)],
    })
}

/// Cloneable queueing handle for the sender thread.
#[derive(Clone)]
pub struct SenderHandle {
    tx: Sender<Outbound>,
}

impl SenderHandle {
    fn enqueue(&self, item: Outbound) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!(target: "osc::sender", "OSC send queue full, dropping message");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queue `(address, value)` for transmission as a single string argument.
    pub fn send(&self, addr: impl Into<String>, value: impl Into<String>) -> bool {
        self.enqueue(Outbound::Message {
            addr: addr.into(),
            value: value.into(),
        })
    }

    /// Queue a dump of every parameter. The snapshot is taken on the sender
    /// thread when the request is reached.
    pub fn send_all_parameters(&self, source: Arc<dyn ParamSource>) -> bool {
        self.enqueue(Outbound::Dump(source))
    }
}

/// Owns the sender thread. Dropping it flushes what is queued and joins.
pub struct OscSender {
    handle: SenderHandle,
    thread: Option<JoinHandle<()>>,
}

impl OscSender {
    pub fn spawn<T: OscTransport>(transport: T) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<Outbound>(SEND_QUEUE_CAPACITY);
        let thread = thread::Builder::new()
            .name("osc-sender".into())
            .spawn(move || sender_loop(transport, rx))?;
        Ok(Self {
            handle: SenderHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SenderHandle {
        self.handle.clone()
    }
}

impl Drop for OscSender {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Outbound::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn transmit<T: OscTransport>(transport: &mut T, packet: &OscPacket) {
    if let Err(e) = transport.send(packet) {
        let addr = match packet {
            OscPacket::Message(m) => m.addr.as_str(),
            OscPacket::Bundle(_) => "#bundle",
        };
        log::error!(target: "osc::sender", "error sending OSC message {}: {}", addr, e);
    }
}

fn sender_loop<T: OscTransport>(mut transport: T, rx: Receiver<Outbound>) {
    while let Ok(item) = rx.recv() {
        match item {
            Outbound::Message { addr, value } => {
                transmit(&mut transport, &string_message(addr, value));
            }
            Outbound::Dump(source) => {
                let params = source.param_snapshot();
                log::debug!(target: "osc::sender", "sending {} parameters", params.len());
                for info in params {
                    transmit(&mut transport, &string_message(info.osc_address(), info.value.to_osc_string()));
                }
            }
            Outbound::Shutdown => break,
        }
    }
}

/// The dispatcher's view of the outbound side: a sender that may or may not
/// be running, gated on the handoff's sending flag.
pub struct OutboundLink {
    handoff: Arc<HandoffState>,
    sender: Mutex<Option<SenderHandle>>,
}

impl OutboundLink {
    pub fn new(handoff: Arc<HandoffState>) -> Self {
        Self {
            handoff,
            sender: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<SenderHandle>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(&self, handle: SenderHandle) {
        *self.slot() = Some(handle);
        self.handoff.set_sending(true);
    }

    pub fn detach(&self) {
        self.handoff.set_sending(false);
        self.slot().take();
    }

    fn current(&self) -> Option<SenderHandle> {
        if !self.handoff.is_sending() {
            return None;
        }
        self.slot().clone()
    }

    /// No-op while sending is disabled.
    pub fn send(&self, addr: impl Into<String>, value: impl Into<String>) -> bool {
        match self.current() {
            Some(handle) => handle.send(addr, value),
            None => false,
        }
    }

    /// No-op while sending is disabled.
    pub fn send_all_parameters(&self, source: Arc<dyn ParamSource>) -> bool {
        match self.current() {
            Some(handle) => handle.send_all_parameters(source),
            None => {
                log::debug!(target: "osc::sender", "send_all_parameters ignored, sending disabled");
                false
            }
        }
    }
}
