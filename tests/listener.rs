use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

use syslogkit::{
    sender, Error, Facility, Listener, ListenerConfig, ListenerState, Severity, SyslogMessage,
    Transport,
};

const WAIT: Duration = Duration::from_secs(5);

fn local_config() -> ListenerConfig {
    ListenerConfig {
        address: "127.0.0.1".into(),
        ..Default::default()
    }
}

fn listener_with_channel() -> (Listener, mpsc::UnboundedReceiver<SyslogMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut listener = Listener::new(local_config());
    listener.set_callback(move |message| {
        let _ = tx.send(message);
    });
    (listener, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<SyslogMessage>) -> SyslogMessage {
    timeout(WAIT, rx.recv())
        .await
        .expect("no message within timeout")
        .expect("callback channel closed")
}

#[tokio::test(flavor = "multi_thread")]
async fn udp_datagram_reaches_callback_once() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, true, false).await.unwrap();
    assert_eq!(listener.state(), ListenerState::Running);
    assert!(listener.tcp_local_addr().is_none());
    let target = listener.udp_local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<14>Jan 1 00:00:00 host app: hello", target)
        .await
        .unwrap();

    let msg = next(&mut rx).await;
    assert_eq!(msg.facility(), 1);
    assert_eq!(msg.severity(), Severity::INFO);
    assert_eq!(msg.hostname(), "host");
    assert_eq!(msg.app_name(), "app");
    assert_eq!(msg.message(), "hello");

    listener.stop().await;
    assert!(rx.try_recv().is_err(), "exactly one callback expected");
    assert_eq!(listener.stats().received, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_newline_trimmed_and_hostname_filled() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, false, true).await.unwrap();
    let target = listener.tcp_local_addr().unwrap();

    let mut stream = TcpStream::connect(target).await.unwrap();
    stream
        .write_all(b"<11>this header is not recognised: disk failed\n")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let msg = next(&mut rx).await;
    assert_eq!(msg.facility(), 1);
    assert_eq!(msg.severity(), Severity::ERR);
    assert_eq!(msg.hostname(), "127.0.0.1");
    assert_eq!(msg.message(), "recognised: disk failed");

    listener.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sender_round_trip_over_both_transports() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, true, true).await.unwrap();

    let sent = SyslogMessage::new(Facility::LOCAL3, Severity::NOTICE, "backup finished")
        .with_timestamp("Feb 28 23:59:59")
        .with_hostname("nas")
        .with_app_name("rsync");

    sender::send_udp(listener.udp_local_addr().unwrap(), &sent)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await, sent);

    sender::send_tcp(listener.tcp_local_addr().unwrap(), &sent)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await, sent);

    listener.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn occupied_tcp_port_fails_to_bind() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let (mut listener, _rx) = listener_with_channel();
    let err = listener.start(port, false, true).await.unwrap_err();

    assert!(
        matches!(
            err,
            Error::Bind {
                transport: Transport::Tcp,
                ..
            }
        ),
        "{err}"
    );
    assert!(err.to_string().contains("tcp"));
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert!(!listener.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn neither_transport_is_rejected() {
    let (mut listener, _rx) = listener_with_channel();
    let err = listener.start(0, false, false).await.unwrap_err();
    assert!(matches!(err, Error::NoTransportEnabled));
    assert!(!listener.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn nothing_delivered_after_stop() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, true, false).await.unwrap();
    let target = listener.udp_local_addr().unwrap();

    listener.stop().await;
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert!(listener.udp_local_addr().is_none());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let _ = client.send_to(b"<14>Jan 1 00:00:00 host late", target).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    // stop is idempotent
    listener.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_on_new_port() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, true, false).await.unwrap();
    let first: SocketAddr = listener.udp_local_addr().unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<14>Jan 1 00:00:00 host first", first)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.message(), "first");

    // starting again stops the running instance first
    listener.start(0, true, false).await.unwrap();
    let second = listener.udp_local_addr().unwrap();
    assert!(listener.is_running());

    client
        .send_to(b"<14>Jan 1 00:00:00 host again", second)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.message(), "again");

    listener.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_payload_cut_at_buffer_size() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut listener = Listener::new(ListenerConfig {
        tcp_buffer_size: 40,
        ..local_config()
    });
    listener.set_callback(move |message| {
        let _ = tx.send(message);
    });
    listener.start(0, false, true).await.unwrap();
    let target = listener.tcp_local_addr().unwrap();

    // 29 header bytes leave room for 11 body bytes
    let mut stream = TcpStream::connect(target).await.unwrap();
    stream
        .write_all(b"<14>Jan 1 00:00:00 host app: 0123456789abcdefghij\n")
        .await
        .unwrap();
    let _ = stream.shutdown().await;

    let msg = next(&mut rx).await;
    assert_eq!(msg.app_name(), "app");
    assert_eq!(msg.message(), "0123456789a");

    listener.stop().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_only_first_read_is_delivered() {
    let (mut listener, mut rx) = listener_with_channel();
    listener.start(0, false, true).await.unwrap();
    let target = listener.tcp_local_addr().unwrap();

    let mut stream = TcpStream::connect(target).await.unwrap();
    stream
        .write_all(b"<14>Jan 1 00:00:00 host app: first half")
        .await
        .unwrap();
    stream.flush().await.unwrap();

    let msg = next(&mut rx).await;
    assert_eq!(msg.message(), "first half");

    // the server closed after its single read; this may or may not error
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = stream.write_all(b" second half\n").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    listener.stop().await;
}
