use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::{decode, Dispatcher, Transport};

/// Bind a non-blocking datagram socket with `SO_REUSEADDR`.
pub(super) fn bind(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// One datagram is one message.
pub(super) struct UdpWorker {
    pub(super) socket: UdpSocket,
    pub(super) buffer_size: usize,
    pub(super) poll_interval: Duration,
    pub(super) running: Arc<AtomicBool>,
    pub(super) dispatcher: Dispatcher,
}

impl UdpWorker {
    pub(super) async fn run(self) {
        let local = self.socket.local_addr().ok();
        tracing::debug!(?local, "syslog UDP worker started");

        let mut buf = vec![0u8; self.buffer_size];
        while self.running.load(Ordering::SeqCst) {
            let received = timeout(self.poll_interval, self.socket.recv_from(&mut buf)).await;
            let (len, peer) = match received {
                // nothing within this poll, check the running flag again
                Err(_) => continue,
                Ok(Ok(received)) => received,
                Ok(Err(err)) => {
                    self.dispatcher.record_error();
                    tracing::warn!(error = %err, "syslog UDP recv error");
                    continue;
                }
            };

            if len == 0 {
                continue;
            }

            let message = decode(&buf[..len], peer);
            tracing::debug!(
                %peer,
                size = len,
                priority = message.priority(),
                "syslog UDP message received"
            );
            self.dispatcher.dispatch(Transport::Udp, message).await;
        }

        tracing::debug!(?local, "syslog UDP worker stopped");
    }
}
