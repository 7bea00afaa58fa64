use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::{decode, Dispatcher, Transport};

/// Bind and listen with `SO_REUSEADDR`, so a restarted listener can take the
/// port back while old connections sit in TIME_WAIT.
pub(super) fn bind(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// One connection carries one message: a single read, then close. Payloads
/// split over several writes or larger than the buffer are truncated.
pub(super) struct TcpWorker {
    pub(super) listener: TcpListener,
    pub(super) buffer_size: usize,
    pub(super) poll_interval: Duration,
    pub(super) read_timeout: Duration,
    pub(super) running: Arc<AtomicBool>,
    pub(super) dispatcher: Dispatcher,
}

impl TcpWorker {
    pub(super) async fn run(self) {
        let local = self.listener.local_addr().ok();
        tracing::debug!(?local, "syslog TCP worker started");

        let mut buf = vec![0u8; self.buffer_size];
        while self.running.load(Ordering::SeqCst) {
            let accepted = timeout(self.poll_interval, self.listener.accept()).await;
            let (stream, peer) = match accepted {
                Err(_) => continue,
                Ok(Ok(accepted)) => accepted,
                Ok(Err(err)) => {
                    self.dispatcher.record_error();
                    tracing::warn!(error = %err, "syslog TCP accept error");
                    continue;
                }
            };

            self.serve(stream, peer, &mut buf).await;
        }

        tracing::debug!(?local, "syslog TCP worker stopped");
    }

    async fn serve(&self, mut stream: TcpStream, peer: SocketAddr, buf: &mut [u8]) {
        let len = match timeout(self.read_timeout, stream.read(buf)).await {
            Ok(Ok(len)) => len,
            Ok(Err(err)) => {
                self.dispatcher.record_error();
                tracing::debug!(%peer, error = %err, "syslog TCP read error");
                return;
            }
            Err(_) => {
                tracing::debug!(%peer, "syslog TCP connection sent nothing, closing");
                return;
            }
        };

        if len == 0 {
            return;
        }

        let message = decode(&buf[..len], peer);
        tracing::debug!(
            %peer,
            size = len,
            priority = message.priority(),
            "syslog TCP message received"
        );
        self.dispatcher.dispatch(Transport::Tcp, message).await;
        // dropping the stream closes the connection
    }
}
