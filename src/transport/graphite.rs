//! Graphite Plaintext Client
//!
//! TCP or UDP connection to a carbon/graphite collector. The connection is
//! opened lazily on the first send, or eagerly via [`GraphiteClient::connect`].
//! With `force_reconnect` every send opens a fresh connection, which keeps
//! metrics flowing through load balancers that drop idle streams.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use futures::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{format_line, unix_timestamp, Transport, TransportFuture};
use crate::aggregator::Aggregator;
use crate::config::{Config, Protocol};
use crate::error::TransportError;

enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Connection {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => {
                stream.write_all(buf).await?;
                Ok(buf.len())
            }
            Connection::Udp(socket) => socket.send(buf).await,
        }
    }

    async fn close(self) -> io::Result<()> {
        match self {
            Connection::Tcp(mut stream) => stream.shutdown().await,
            Connection::Udp(_) => Ok(()),
        }
    }
}

pub struct GraphiteClient {
    config: Config,
    connection: Mutex<Option<Connection>>,
}

impl GraphiteClient {
    /// Client using the protocol selected in `config`
    pub fn new(config: Config) -> Self {
        GraphiteClient {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn tcp(config: Config) -> Self {
        Self::new(config.with_protocol(Protocol::Tcp))
    }

    pub fn udp(config: Config) -> Self {
        Self::new(config.with_protocol(Protocol::Udp))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Open a connection, replacing any existing one
    pub async fn connect(&self) -> Result<(), TransportError> {
        let connection = self.open().await?;
        *self.connection.lock().await = Some(connection);
        Ok(())
    }

    /// Close the current connection
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        let mut slot = self.connection.lock().await;
        Self::close(&mut slot).await
    }

    /// Close the current connection (ignoring close errors) and open a new one
    pub async fn reconnect(&self) -> Result<(), TransportError> {
        let mut slot = self.connection.lock().await;
        self.reopen(&mut slot).await
    }

    /// Write a pre-formatted buffer, connecting first if needed
    pub async fn send_buffer(&self, buf: &[u8]) -> Result<usize, TransportError> {
        let mut slot = self.connection.lock().await;
        if self.config.force_reconnect || slot.is_none() {
            self.reopen(&mut slot).await?;
        }
        let connection = slot.as_mut().ok_or(TransportError::NotConnected)?;
        let written = connection.write(buf).await?;
        debug!(bytes = written, "graphite: buffer sent");
        Ok(written)
    }

    /// Send a single metric line stamped with the current time
    pub async fn send_metric(&self, path: &str, value: &str) -> Result<usize, TransportError> {
        let line = format_line(path, value, unix_timestamp());
        self.send_buffer(line.as_bytes()).await
    }

    /// Aggregator bound to this client, using the configured namespace
    pub fn into_aggregator(self) -> Aggregator<GraphiteClient> {
        let namespace = self.config.namespace.clone();
        Aggregator::new(namespace, Arc::new(self))
    }

    async fn close(slot: &mut Option<Connection>) -> Result<(), TransportError> {
        match slot.take() {
            Some(connection) => Ok(connection.close().await?),
            None => Err(TransportError::NotConnected),
        }
    }

    async fn reopen(&self, slot: &mut Option<Connection>) -> Result<(), TransportError> {
        let _ = Self::close(slot).await;
        *slot = Some(self.open().await?);
        Ok(())
    }

    async fn open(&self) -> Result<Connection, TransportError> {
        let addr = self.config.address();
        let limit = self.config.timeout();
        info!(address = %addr, protocol = %self.config.protocol, "graphite: connecting");

        match timeout(limit, self.open_unbounded(&addr)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout {
                addr,
                timeout: limit,
            }),
        }
    }

    async fn open_unbounded(&self, addr: &str) -> Result<Connection, TransportError> {
        let connect_err = |source: io::Error| TransportError::Connect {
            addr: addr.to_string(),
            source,
        };

        match self.config.protocol {
            Protocol::Tcp => {
                let stream = TcpStream::connect(addr).await.map_err(connect_err)?;
                stream.set_nodelay(true).map_err(connect_err)?;
                Ok(Connection::Tcp(stream))
            }
            Protocol::Udp => {
                let target = lookup_host(addr)
                    .await
                    .map_err(connect_err)?
                    .next()
                    .ok_or_else(|| TransportError::Resolve {
                        addr: addr.to_string(),
                    })?;
                let local: SocketAddr = if target.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local).await.map_err(connect_err)?;
                socket.connect(target).await.map_err(connect_err)?;
                Ok(Connection::Udp(socket))
            }
        }
    }
}

impl Transport for GraphiteClient {
    fn send<'a>(&'a self, buf: &'a [u8]) -> TransportFuture<'a, usize> {
        self.send_buffer(buf).boxed()
    }

    fn reconnect(&self) -> TransportFuture<'_, ()> {
        GraphiteClient::reconnect(self).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constructors() {
        let config = Config::new("127.0.0.1", 2003).with_protocol(Protocol::Udp);
        assert_eq!(GraphiteClient::tcp(config.clone()).config().protocol, Protocol::Tcp);
        assert_eq!(GraphiteClient::udp(config).config().protocol, Protocol::Udp);
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let client = GraphiteClient::tcp(Config::new("127.0.0.1", 2003));
        assert!(!client.is_connected().await);
        assert!(matches!(
            client.disconnect().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_into_aggregator_uses_namespace() {
        let config = Config::new("127.0.0.1", 2003).with_namespace("beta.instance");
        let aggregator = GraphiteClient::tcp(config).into_aggregator();
        assert_eq!(aggregator.namespace(), "beta.instance");
        assert_eq!(aggregator.transport().config().port, 2003);
    }
}
