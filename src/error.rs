use std::path::PathBuf;

use thiserror::Error;

use crate::listener::Transport;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {transport} socket on {address}: {source}")]
    Bind {
        transport: Transport,
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no transport enabled, at least one of udp or tcp is required")]
    NoTransportEnabled,
    #[error("failed to open log store '{}': {source}", path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("log store is not open")]
    StoreNotOpen,
    #[error("failed to write log entry: {0}")]
    StoreWrite(#[source] rusqlite::Error),
    #[error("failed to query log store: {0}")]
    StoreQuery(#[source] rusqlite::Error),
    #[error("failed to send message to {address}: {source}")]
    Send {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad severity '{0}'")]
    BadSeverity(String),
    #[error("unknown facility '{0}'")]
    BadFacility(String),
}
