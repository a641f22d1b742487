use std::io;
use std::net::SocketAddr;
use anyhow::{anyhow, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Any byte stream a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedTransport = Box<dyn Transport>;

/// The TCP layer of a connection: the transport plus any bytes already read
/// from it but not yet consumed.
pub struct TcpConnectionContext {
    transport: Option<BoxedTransport>,
    read_ahead: BytesMut,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
}

impl TcpConnectionContext {

    pub fn new(transport: BoxedTransport, local_addr: Option<SocketAddr>, remote_addr: Option<SocketAddr>) -> Self {
        TcpConnectionContext { transport: Some(transport), read_ahead: BytesMut::new(), local_addr, remote_addr }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// True once the transport was handed to an upgraded connection.
    pub fn is_released(&self) -> bool {
        self.transport.is_none()
    }

    pub fn transport_mut(&mut self) -> Result<&mut BoxedTransport> {
        self.transport.as_mut().ok_or_else(|| anyhow!("transport already released"))
    }

    pub fn read_ahead_mut(&mut self) -> &mut BytesMut {
        &mut self.read_ahead
    }

    /// Reads more bytes into the read-ahead buffer. `Ok(0)` is EOF.
    pub async fn fill(&mut self) -> io::Result<usize> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport already released"));
        };
        transport.read_buf(&mut self.read_ahead).await
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let transport = self.transport_mut()?;
        transport.write_all(bytes).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Moves the transport and the unread bytes into a new context, leaving
    /// this one released.
    pub fn capture(&mut self) -> Option<TcpConnectionContext> {
        let transport = self.transport.take()?;
        Some(TcpConnectionContext {
            transport: Some(transport),
            read_ahead: self.read_ahead.split(),
            local_addr: self.local_addr,
            remote_addr: self.remote_addr,
        })
    }

    pub fn into_parts(self) -> Option<(BoxedTransport, BytesMut)> {
        let transport = self.transport?;
        Some((transport, self.read_ahead))
    }
}

impl std::fmt::Debug for TcpConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnectionContext")
            .field("released", &self.is_released())
            .field("read_ahead", &self.read_ahead.len())
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}


/// Link between the HTTP channel and the device (TCP) side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLink {
    connection_id: u64,
}

impl DeviceLink {
    pub fn new(connection_id: u64) -> Self {
        DeviceLink { connection_id }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

/// Link between the HTTP channel and the request dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherLink {
    connection_id: u64,
    netty: bool,
}

impl DispatcherLink {
    pub fn new(connection_id: u64) -> Self {
        DispatcherLink { connection_id, netty: false }
    }

    /// A link whose pipeline is Netty-backed.
    pub fn netty(connection_id: u64) -> Self {
        DispatcherLink { connection_id, netty: true }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn is_netty(&self) -> bool {
        self.netty
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_moves_transport_and_read_ahead() {
        let (server, mut client) = tokio::io::duplex(64);
        let mut tcp = TcpConnectionContext::new(Box::new(server), None, None);
        tcp.read_ahead_mut().extend_from_slice(b"leftover");

        let captured = tcp.capture().unwrap();
        assert!(tcp.is_released());
        assert!(tcp.write_all(b"nope").await.is_err());
        assert!(tcp.capture().is_none());

        let (mut transport, read_ahead) = captured.into_parts().unwrap();
        assert_eq!(&read_ahead[..], b"leftover");

        transport.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn fill_appends_to_read_ahead() {
        let (server, mut client) = tokio::io::duplex(64);
        let mut tcp = TcpConnectionContext::new(Box::new(server), None, None);

        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        let n = tcp.fill().await.unwrap();
        assert_eq!(n, 16);
        assert_eq!(&tcp.read_ahead_mut()[..], b"GET / HTTP/1.1\r\n");

        drop(client);
        assert_eq!(tcp.fill().await.unwrap(), 0);
    }
}
