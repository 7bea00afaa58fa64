//! Emit messages to a syslog receiver.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use crate::codec;
use crate::message::SyslogMessage;
use crate::{Error, Result};

/// Send `message` as a single datagram.
pub async fn send_udp(target: SocketAddr, message: &SyslogMessage) -> Result<()> {
    let payload = codec::build(message);
    let send_err = |source| Error::Send {
        address: target.to_string(),
        source,
    };

    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await.map_err(send_err)?;
    socket
        .send_to(payload.as_bytes(), target)
        .await
        .map_err(send_err)?;

    tracing::debug!(%target, size = payload.len(), "syslog message sent over udp");
    Ok(())
}

/// Send `message` over a fresh TCP connection, newline terminated.
pub async fn send_tcp(target: SocketAddr, message: &SyslogMessage) -> Result<()> {
    let mut payload = codec::build(message);
    payload.push('\n');
    let send_err = |source| Error::Send {
        address: target.to_string(),
        source,
    };

    let mut stream = TcpStream::connect(target).await.map_err(send_err)?;
    stream
        .write_all(payload.as_bytes())
        .await
        .map_err(send_err)?;
    stream.shutdown().await.map_err(send_err)?;

    tracing::debug!(%target, size = payload.len(), "syslog message sent over tcp");
    Ok(())
}
