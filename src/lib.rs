//! Receive, decode, store and search BSD style syslog messages.
//!
//! The pieces are independent:
//!
//!  * [`codec`] turns a [`SyslogMessage`] into `<PRI>TIMESTAMP HOSTNAME[ APP:] MESSAGE`
//!    and back. Parsing never fails; malformed input degrades to defaults.
//!  * [`Listener`] receives messages over UDP and TCP and hands each decoded
//!    message to a callback.
//!  * [`LogStore`] appends messages to a SQLite file and answers filtered,
//!    most-recent-first queries.
//!  * [`sender`] emits messages to a receiver.
//!
//! # Example
//!
//! A minimal collector writing everything it receives to disk:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use syslogkit::{Listener, ListenerConfig, LogFilter, LogStore};
//!
//! #[tokio::main]
//! async fn main() -> syslogkit::Result<()> {
//!     let store = Arc::new(LogStore::new());
//!     store.open("logs.db")?;
//!
//!     let mut listener = Listener::new(ListenerConfig::default());
//!     let sink = Arc::clone(&store);
//!     listener.set_callback(move |message| {
//!         let _ = sink.write(&message);
//!     });
//!     listener.start(5140, true, true).await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     listener.stop().await;
//!
//!     for message in store.query(&LogFilter::default())? {
//!         println!("{} {}", message.hostname(), message.message());
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
mod error;
mod facility;
pub mod listener;
mod message;
pub mod sender;
mod severity;
pub mod store;
pub mod timestamp;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use facility::Facility;
pub use listener::{
    Backpressure, Listener, ListenerConfig, ListenerState, ListenerStatsSnapshot, Transport,
};
pub use message::SyslogMessage;
pub use severity::Severity;
pub use store::{LogFilter, LogStore, StoreConfig};
