//! UDP receive thread for inbound OSC.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::dispatch::OscDispatcher;
use crate::handoff::HandoffState;
use crate::host::SynthHost;

/// How long a blocked `recv` waits before re-checking the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

const MAX_PACKET: usize = 65_536;

/// Where the receive thread reads datagrams from. `recv` should return
/// `WouldBlock` or `TimedOut` periodically so the thread can notice a stop
/// request; any other error ends the thread.
pub trait PacketSource: Send + 'static {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl PacketSource for UdpSocket {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf)
    }
}

/// Owns the network thread. The thread owns the dispatcher while it runs and
/// hands it back from [`OscListener::stop`].
pub struct OscListener<H: SynthHost + 'static> {
    running: Arc<AtomicBool>,
    handoff: Arc<HandoffState>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<OscDispatcher<H>>>,
}

impl<H: SynthHost + 'static> OscListener<H> {
    /// Start receiving on an already-bound socket.
    pub fn spawn(
        socket: UdpSocket,
        dispatcher: OscDispatcher<H>,
        handoff: Arc<HandoffState>,
    ) -> io::Result<Self> {
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        Self::spawn_with(socket, local_addr, dispatcher, handoff)
    }

    /// Start receiving from any packet source. `local_addr` is only reported
    /// back to callers.
    pub fn spawn_with<S: PacketSource>(
        mut source: S,
        local_addr: SocketAddr,
        mut dispatcher: OscDispatcher<H>,
        handoff: Arc<HandoffState>,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread_handoff = Arc::clone(&handoff);

        // Raised before the thread exists so an immediate receive failure
        // cannot be overwritten.
        handoff.set_listening(true);
        let spawned = thread::Builder::new()
            .name("osc-listener".into())
            .spawn(move || {
                let mut buf = vec![0u8; MAX_PACKET];
                while flag.load(Ordering::Acquire) {
                    match source.recv(&mut buf) {
                        Ok(n) => match rosc::decoder::decode_udp(&buf[..n]) {
                            Ok((_, packet)) => dispatcher.dispatch_packet(&packet),
                            Err(e) => {
                                log::debug!(target: "osc::listener", "undecodable packet ({} bytes): {:?}", n, e)
                            }
                        },
                        Err(ref e)
                            if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                        {
                            continue
                        }
                        Err(e) => {
                            log::error!(target: "osc::listener", "receive failed, stopping: {}", e);
                            thread_handoff.set_listening(false);
                            break;
                        }
                    }
                }
                dispatcher
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                handoff.set_listening(false);
                return Err(e);
            }
        };

        log::info!(target: "osc::listener", "OSC listening on port {}", local_addr.port());
        Ok(Self {
            running,
            handoff,
            local_addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the thread and take the dispatcher back. `None` if the thread
    /// panicked.
    pub fn stop(mut self) -> Option<OscDispatcher<H>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<OscDispatcher<H>> {
        let thread = self.thread.take()?;
        self.running.store(false, Ordering::Release);
        self.handoff.set_listening(false);
        let dispatcher = thread.join().ok();
        log::info!(target: "osc::listener", "OSC listener on port {} stopped", self.local_addr.port());
        dispatcher
    }
}

impl<H: SynthHost + 'static> Drop for OscListener<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
