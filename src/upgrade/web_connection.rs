use anyhow::{anyhow, Result};
use bytes::BytesMut;
use crate::upgrade::transport::{BoxedTransport, DeviceLink, DispatcherLink, TcpConnectionContext};
use crate::upgrade::virtual_connection::VirtualConnection;

/// Connection handed to WebSocket-style handlers. It talks to the device
/// link directly.
#[derive(Debug)]
pub struct WebTransportConnection {
    tcp: TcpConnectionContext,
    device_link: DeviceLink,
    vc: VirtualConnection,
}

impl WebTransportConnection {
    pub fn new(tcp: TcpConnectionContext, device_link: DeviceLink, vc: VirtualConnection) -> Self {
        WebTransportConnection { tcp, device_link, vc }
    }
}

/// Connection handed to every other handler. It keeps the dispatcher link
/// for the channel it came from.
#[derive(Debug)]
pub struct UpgradedWebConnection {
    tcp: TcpConnectionContext,
    device_link: DeviceLink,
    dispatcher_link: DispatcherLink,
    vc: VirtualConnection,
}

impl UpgradedWebConnection {
    pub fn new(tcp: TcpConnectionContext, device_link: DeviceLink, dispatcher_link: DispatcherLink, vc: VirtualConnection) -> Self {
        UpgradedWebConnection { tcp, device_link, dispatcher_link, vc }
    }
}

/// Same as `UpgradedWebConnection`, for Netty-backed dispatcher links.
#[derive(Debug)]
pub struct NettyUpgradedWebConnection {
    tcp: TcpConnectionContext,
    device_link: DeviceLink,
    dispatcher_link: DispatcherLink,
    vc: VirtualConnection,
}

impl NettyUpgradedWebConnection {
    pub fn new(tcp: TcpConnectionContext, device_link: DeviceLink, dispatcher_link: DispatcherLink, vc: VirtualConnection) -> Self {
        NettyUpgradedWebConnection { tcp, device_link, dispatcher_link, vc }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradedConnectionKind {
    WebTransport,
    Upgraded,
    NettyUpgraded,
}

#[derive(Debug)]
pub enum UpgradedConnection {
    WebTransport(WebTransportConnection),
    Upgraded(UpgradedWebConnection),
    NettyUpgraded(NettyUpgradedWebConnection),
}

impl UpgradedConnection {

    pub fn kind(&self) -> UpgradedConnectionKind {
        match self {
            UpgradedConnection::WebTransport(_) => UpgradedConnectionKind::WebTransport,
            UpgradedConnection::Upgraded(_) => UpgradedConnectionKind::Upgraded,
            UpgradedConnection::NettyUpgraded(_) => UpgradedConnectionKind::NettyUpgraded,
        }
    }

    pub fn device_link(&self) -> &DeviceLink {
        match self {
            UpgradedConnection::WebTransport(c) => &c.device_link,
            UpgradedConnection::Upgraded(c) => &c.device_link,
            UpgradedConnection::NettyUpgraded(c) => &c.device_link,
        }
    }

    /// `None` for web transport connections.
    pub fn dispatcher_link(&self) -> Option<&DispatcherLink> {
        match self {
            UpgradedConnection::WebTransport(_) => None,
            UpgradedConnection::Upgraded(c) => Some(&c.dispatcher_link),
            UpgradedConnection::NettyUpgraded(c) => Some(&c.dispatcher_link),
        }
    }

    pub fn virtual_connection(&self) -> &VirtualConnection {
        match self {
            UpgradedConnection::WebTransport(c) => &c.vc,
            UpgradedConnection::Upgraded(c) => &c.vc,
            UpgradedConnection::NettyUpgraded(c) => &c.vc,
        }
    }

    pub fn tcp(&self) -> &TcpConnectionContext {
        match self {
            UpgradedConnection::WebTransport(c) => &c.tcp,
            UpgradedConnection::Upgraded(c) => &c.tcp,
            UpgradedConnection::NettyUpgraded(c) => &c.tcp,
        }
    }

    /// The raw transport together with any bytes the HTTP/1.1 reader
    /// already buffered past the upgrade request.
    pub fn into_transport(self) -> Result<(BoxedTransport, BytesMut)> {
        let tcp = match self {
            UpgradedConnection::WebTransport(c) => c.tcp,
            UpgradedConnection::Upgraded(c) => c.tcp,
            UpgradedConnection::NettyUpgraded(c) => c.tcp,
        };
        tcp.into_parts().ok_or_else(|| anyhow!("upgraded connection has no transport"))
    }
}
