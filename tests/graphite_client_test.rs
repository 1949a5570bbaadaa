//! Graphite Client Tests
//!
//! Real loopback sockets standing in for a carbon collector.

use std::time::Duration;

use graphite_emitter::transport::WireLine;
use graphite_emitter::{Config, GraphiteClient, Protocol, TransportError};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};

async fn tcp_collector() -> (TcpListener, Config) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = Config::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));
    (listener, config)
}

async fn read_all(listener: &TcpListener) -> String {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut received = String::new();
    stream.read_to_string(&mut received).await.unwrap();
    received
}

#[tokio::test]
async fn test_tcp_send_metric() {
    let (listener, config) = tcp_collector().await;
    let client = GraphiteClient::tcp(config);

    let written = client.send_metric("metricA", "10").await.unwrap();
    assert_eq!(written, "metricA 10 ".len() + 11);
    assert!(client.is_connected().await);
    client.disconnect().await.unwrap();

    let received = read_all(&listener).await;
    let line = WireLine::parse(&received).unwrap();
    assert_eq!(line.path, "metricA");
    assert_eq!(line.value, "10");
}

#[tokio::test]
async fn test_tcp_send_buffer_exact_bytes() {
    let (listener, config) = tcp_collector().await;
    let client = GraphiteClient::new(config);
    client.connect().await.unwrap();

    let buf = b"metricA 10 1554992147\n";
    assert_eq!(client.send_buffer(buf).await.unwrap(), 22);
    client.disconnect().await.unwrap();

    assert_eq!(read_all(&listener).await.as_bytes(), buf);
}

#[tokio::test]
async fn test_udp_send_buffer() {
    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();
    let client = GraphiteClient::udp(Config::new("127.0.0.1", port));

    let buf = b"metricA 10 1554992147\n";
    assert_eq!(client.send_buffer(buf).await.unwrap(), 22);

    let mut datagram = [0u8; 64];
    let n = collector.recv(&mut datagram).await.unwrap();
    assert_eq!(&datagram[..n], buf);
}

#[tokio::test]
async fn test_connect_refused() {
    // Grab a free port, then close the listener so nothing accepts on it
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = GraphiteClient::tcp(Config::new("127.0.0.1", port));

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::Connect { .. }), "{err}");
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_disconnect_twice() {
    let (_listener, config) = tcp_collector().await;
    let client = GraphiteClient::tcp(config);
    client.connect().await.unwrap();

    client.disconnect().await.unwrap();
    assert!(matches!(
        client.disconnect().await,
        Err(TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn test_reconnect_opens_new_stream() {
    let (listener, config) = tcp_collector().await;
    let client = GraphiteClient::tcp(config);

    client.send_buffer(b"a 1 1\n").await.unwrap();
    client.reconnect().await.unwrap();
    client.send_buffer(b"b 2 2\n").await.unwrap();
    client.disconnect().await.unwrap();

    assert_eq!(read_all(&listener).await, "a 1 1\n");
    assert_eq!(read_all(&listener).await, "b 2 2\n");
}

#[tokio::test]
async fn test_force_reconnect_uses_stream_per_send() {
    let (listener, config) = tcp_collector().await;
    let client = GraphiteClient::tcp(config.with_force_reconnect(true));

    client.send_buffer(b"a 1 1\n").await.unwrap();
    client.send_buffer(b"b 2 2\n").await.unwrap();
    client.disconnect().await.unwrap();

    assert_eq!(read_all(&listener).await, "a 1 1\n");
    assert_eq!(read_all(&listener).await, "b 2 2\n");
}

#[tokio::test]
async fn test_aggregator_flush_over_tcp() {
    let (listener, config) = tcp_collector().await;
    let aggregator = GraphiteClient::tcp(config.with_namespace("beta.instance")).into_aggregator();

    aggregator.add_sum("requests", 5).unwrap();
    aggregator.add_sum("requests", 3).unwrap();
    aggregator.add_average("latency", 2).unwrap();
    aggregator.add_average("latency", 4).unwrap();
    aggregator.set_active("up").unwrap();

    let written = aggregator.flush().await.unwrap();
    aggregator.transport().disconnect().await.unwrap();

    let received = read_all(&listener).await;
    assert_eq!(received.len(), written);

    let mut lines = WireLine::parse_batch(received.as_bytes());
    lines.sort_by(|a, b| a.path.cmp(&b.path));
    let pairs: Vec<_> = lines
        .iter()
        .map(|l| (l.path.as_str(), l.value.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("beta.instance.latency", "3.000000"),
            ("beta.instance.requests", "8"),
            ("beta.instance.up", "1"),
        ]
    );
    assert!(aggregator.is_empty());
}

#[tokio::test]
async fn test_aggregator_flush_without_collector_keeps_data() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let aggregator = GraphiteClient::new(Config::new("127.0.0.1", port).with_protocol(Protocol::Tcp))
        .into_aggregator();
    aggregator.increase("hits").unwrap();

    assert!(aggregator.flush().await.is_err());
    assert!(aggregator.retry().await.is_err());
    assert_eq!(aggregator.calculate("hits").as_deref(), Some("1"));
}
