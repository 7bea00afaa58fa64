//! Syslog network listener.
//!
//! One worker task per enabled transport polls its socket with a bounded wait,
//! decodes what arrives and hands the message to a single consumer through a
//! bounded channel. The consumer runs on the blocking pool and invokes the
//! registered callback, so the callback may block (for example on a
//! [`LogStore`](crate::LogStore) write) without stalling the runtime.
//!
//! Shutdown is cooperative: [`Listener::stop`] clears the running flag, every
//! worker notices it at its next poll and closes its socket, and `stop` only
//! returns once the workers and the consumer are gone.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use syslogkit::{Listener, ListenerConfig, LogStore};
//!
//! # async fn run() -> syslogkit::Result<()> {
//! let store = Arc::new(LogStore::new());
//! store.open("logs.db")?;
//!
//! let mut listener = Listener::new(ListenerConfig::default());
//! let sink = Arc::clone(&store);
//! listener.set_callback(move |message| {
//!     if let Err(err) = sink.write(&message) {
//!         eprintln!("dropping message: {err}");
//!     }
//! });
//!
//! listener.start(5140, true, true).await?;
//! // ...
//! listener.stop().await;
//! # Ok(())
//! # }
//! ```

mod tcp;
mod udp;

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::codec;
use crate::message::SyslogMessage;
use crate::{Error, Result};

/// Default poll interval, also the upper bound on shutdown latency per worker.
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default capacity of the worker -> consumer queue.
const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Default receive buffer for one datagram.
const DEFAULT_UDP_BUFFER_SIZE: usize = 2048;

/// Default buffer for the single read done per TCP connection.
const DEFAULT_TCP_BUFFER_SIZE: usize = 4096;

const DEFAULT_TCP_BACKLOG: i32 = 5;

const DEFAULT_TCP_READ_TIMEOUT_MS: u64 = 1000;

/// Poll intervals a worker gets to notice the stop flag before it is aborted.
const SHUTDOWN_POLLS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a worker does when the consumer queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait for room. A slow callback slows down receiving; UDP then loses
    /// datagrams in the kernel buffer instead.
    #[default]
    Block,
    /// Drop the message that did not fit and count it.
    DropNewest,
}

/// `[listener]` section of the configuration file.
///
/// ```toml
/// [listener]
/// address = "0.0.0.0"
/// poll_interval_ms = 50
/// queue_size = 1024
/// backpressure = "block"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind, all interfaces by default
    pub address: String,
    pub poll_interval_ms: u64,
    pub queue_size: usize,
    pub backpressure: Backpressure,
    pub udp_buffer_size: usize,
    pub tcp_buffer_size: usize,
    pub tcp_backlog: i32,
    pub tcp_read_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            queue_size: DEFAULT_QUEUE_SIZE,
            backpressure: Backpressure::default(),
            udp_buffer_size: DEFAULT_UDP_BUFFER_SIZE,
            tcp_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            tcp_backlog: DEFAULT_TCP_BACKLOG,
            tcp_read_timeout_ms: DEFAULT_TCP_READ_TIMEOUT_MS,
        }
    }
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tcp_read_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_read_timeout_ms)
    }

    fn socket_addr(&self, transport: Transport, port: u16) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.parse().map_err(|_| Error::Bind {
            transport,
            address: format!("{}:{}", self.address, port),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid listen address",
            ),
        })?;
        Ok(SocketAddr::new(ip, port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug, Default)]
struct ListenerStats {
    received: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
}

/// Counters accumulated over the lifetime of a [`Listener`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub received: u64,
    pub dropped: u64,
    pub errors: u64,
}

impl ListenerStats {
    fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

pub type Callback = Arc<dyn Fn(SyslogMessage) + Send + Sync + 'static>;

/// Worker side of the consumer queue.
#[derive(Clone)]
struct Dispatcher {
    tx: mpsc::Sender<SyslogMessage>,
    backpressure: Backpressure,
    stats: Arc<ListenerStats>,
}

impl Dispatcher {
    async fn dispatch(&self, transport: Transport, message: SyslogMessage) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        match self.backpressure {
            Backpressure::Block => {
                if self.tx.send(message).await.is_err() {
                    tracing::debug!(%transport, "syslog consumer gone, message discarded");
                }
            }
            Backpressure::DropNewest => match self.tx.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(%transport, "syslog queue full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%transport, "syslog consumer gone, message discarded");
                }
            },
        }
    }

    fn record_error(&self) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decode one received payload, naming the sender after its address when the
/// header carries no hostname.
fn decode(data: &[u8], peer: SocketAddr) -> SyslogMessage {
    let message = codec::parse(trim_trailing_newline(data));
    if message.hostname().is_empty() {
        message.with_hostname(peer.ip().to_string())
    } else {
        message
    }
}

/// Trim trailing newline from message (LF or CRLF)
#[inline]
pub fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();

    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }

    &data[..end]
}

fn spawn_consumer(
    mut rx: mpsc::Receiver<SyslogMessage>,
    callback: Option<Callback>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(message) = rx.blocking_recv() {
            match &callback {
                Some(callback) => callback(message),
                None => tracing::trace!("no callback registered, message discarded"),
            }
        }
    })
}

/// UDP + TCP syslog receiver.
pub struct Listener {
    config: ListenerConfig,
    callback: Option<Callback>,
    state: ListenerState,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    workers: Vec<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
    udp_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
}

impl Listener {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            callback: None,
            state: ListenerState::Stopped,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ListenerStats::default()),
            workers: Vec::new(),
            consumer: None,
            udp_addr: None,
            tcp_addr: None,
        }
    }

    /// Register the callback receiving every decoded message, replacing any
    /// earlier one. It takes effect at the next [`start`](Self::start).
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(SyslogMessage) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ListenerState::Running
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Bound UDP address while running. Useful when started on port 0.
    pub fn udp_local_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    /// Bound TCP address while running.
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    pub fn stats(&self) -> ListenerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Bind the enabled transports on `port` and start receiving.
    ///
    /// A running listener is stopped first. Every socket is bound before any
    /// worker starts, so a bind failure is reported here and leaves the
    /// listener stopped.
    pub async fn start(&mut self, port: u16, enable_udp: bool, enable_tcp: bool) -> Result<()> {
        if self.state != ListenerState::Stopped {
            self.stop().await;
        }
        if !enable_udp && !enable_tcp {
            return Err(Error::NoTransportEnabled);
        }

        self.state = ListenerState::Starting;
        match self.spawn(port, enable_udp, enable_tcp) {
            Ok(()) => {
                self.state = ListenerState::Running;
                tracing::info!(
                    udp = ?self.udp_addr,
                    tcp = ?self.tcp_addr,
                    backpressure = ?self.config.backpressure,
                    "syslog listener running"
                );
                Ok(())
            }
            Err(err) => {
                self.state = ListenerState::Stopped;
                tracing::warn!(error = %err, "syslog listener failed to start");
                Err(err)
            }
        }
    }

    fn spawn(&mut self, port: u16, enable_udp: bool, enable_tcp: bool) -> Result<()> {
        let udp_socket = if enable_udp {
            let addr = self.config.socket_addr(Transport::Udp, port)?;
            let socket = udp::bind(addr).map_err(|source| Error::Bind {
                transport: Transport::Udp,
                address: addr.to_string(),
                source,
            })?;
            Some(socket)
        } else {
            None
        };

        // an early return here drops (and closes) the UDP socket bound above
        let tcp_listener = if enable_tcp {
            let addr = self.config.socket_addr(Transport::Tcp, port)?;
            let listener =
                tcp::bind(addr, self.config.tcp_backlog).map_err(|source| Error::Bind {
                    transport: Transport::Tcp,
                    address: addr.to_string(),
                    source,
                })?;
            Some(listener)
        } else {
            None
        };

        let (tx, rx) = mpsc::channel(self.config.queue_size.max(1));
        let dispatcher = Dispatcher {
            tx,
            backpressure: self.config.backpressure,
            stats: Arc::clone(&self.stats),
        };
        self.running = Arc::new(AtomicBool::new(true));

        if let Some(socket) = udp_socket {
            self.udp_addr = socket.local_addr().ok();
            let worker = udp::UdpWorker {
                socket,
                buffer_size: self.config.udp_buffer_size,
                poll_interval: self.config.poll_interval(),
                running: Arc::clone(&self.running),
                dispatcher: dispatcher.clone(),
            };
            self.workers.push(tokio::spawn(worker.run()));
        }

        if let Some(listener) = tcp_listener {
            self.tcp_addr = listener.local_addr().ok();
            let worker = tcp::TcpWorker {
                listener,
                buffer_size: self.config.tcp_buffer_size,
                poll_interval: self.config.poll_interval(),
                read_timeout: self.config.tcp_read_timeout(),
                running: Arc::clone(&self.running),
                dispatcher: dispatcher.clone(),
            };
            self.workers.push(tokio::spawn(worker.run()));
        }

        // the consumer ends once every worker has dropped its sender
        drop(dispatcher);
        self.consumer = Some(spawn_consumer(rx, self.callback.clone()));

        Ok(())
    }

    /// Stop receiving and wait until the workers and the consumer are gone.
    /// Messages already queued are still delivered before this returns.
    pub async fn stop(&mut self) {
        if self.state == ListenerState::Stopped {
            return;
        }
        self.running.store(false, Ordering::SeqCst);

        let grace = self.config.poll_interval() * SHUTDOWN_POLLS + self.config.tcp_read_timeout();
        for mut worker in self.workers.drain(..) {
            if tokio::time::timeout(grace, &mut worker).await.is_err() {
                tracing::warn!("syslog worker did not stop in time, aborting it");
                worker.abort();
                let _ = worker.await;
            }
        }

        if let Some(consumer) = self.consumer.take() {
            if let Err(err) = consumer.await {
                tracing::warn!(error = %err, "syslog consumer ended abnormally");
            }
        }

        self.udp_addr = None;
        self.tcp_addr = None;
        self.state = ListenerState::Stopped;
        tracing::info!("syslog listener stopped");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
