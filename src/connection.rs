use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use tracing::{debug, info, warn};
use crate::config::HttpChannelConfig;
use crate::connection_reader::{Http11Reader, RequestError, RequestHead};
use crate::dispatcher::Dispatcher;
use crate::ffdc::FailureRecorder;
use crate::http2::http2_connection::Http2Connection;
use crate::http2::http2_frame::CONNECTION_PREFACE;
use crate::http_object::{HttpRequest, HttpResponse};
use crate::upgrade::connection_context::ConnectionContext;
use crate::upgrade::h2c::{prepare_h2c_upgrade, H2cPreparation};
use crate::upgrade::transport::{BoxedTransport, DeviceLink, DispatcherLink, TcpConnectionContext};
use crate::upgrade::virtual_connection::VirtualConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientProtocol {
    Http1,
    Http2,
}

/// Owns one accepted connection from the first byte until it closes or is
/// handed to an upgrade handler.
pub struct ConnectionOwner {
    ctx: ConnectionContext,
    reader: Http11Reader,
    config: Arc<HttpChannelConfig>,
    dispatcher: Arc<Dispatcher>,
}

impl ConnectionOwner {

    pub fn new(transport: BoxedTransport,
               connection_id: u64,
               addrs: (Option<SocketAddr>, Option<SocketAddr>),
               config: Arc<HttpChannelConfig>,
               dispatcher: Arc<Dispatcher>,
               ffdc: Arc<FailureRecorder>) -> Self {
        let (local_addr, remote_addr) = addrs;
        let tcp = TcpConnectionContext::new(transport, local_addr, remote_addr);
        let ctx = ConnectionContext::new(tcp,
                                         DeviceLink::new(connection_id),
                                         DispatcherLink::new(connection_id),
                                         VirtualConnection::new(connection_id),
                                         ffdc);
        ConnectionOwner {
            ctx,
            reader: Http11Reader::new(config.max_request_header_bytes()),
            config,
            dispatcher,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    pub async fn serve(mut self) -> Result<()> {
        match self.detect_protocol().await? {
            None => {
                debug!("connection closed before the first request.");
                Ok(())
            },
            Some(ClientProtocol::Http2) if !self.config.http2_enabled() => {
                warn!("client sent the HTTP/2 preface but HTTP/2 is disabled, closing.");
                Ok(())
            },
            Some(ClientProtocol::Http2) => {
                let (transport, read_ahead) = self.ctx.tcp_mut().capture()
                    .and_then(TcpConnectionContext::into_parts)
                    .ok_or_else(|| anyhow!("transport released before HTTP/2 started"))?;
                info!("connection speaks HTTP/2 with prior knowledge.");
                Http2Connection::new(self.config, self.dispatcher)
                    .serve(transport, read_ahead, None)
                    .await
            },
            Some(ClientProtocol::Http1) => self.serve_http1().await,
        }
    }

    // PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n
    async fn detect_protocol(&mut self) -> Result<Option<ClientProtocol>> {
        loop {
            let buf = self.ctx.tcp_mut().read_ahead_mut();
            let available = buf.len().min(CONNECTION_PREFACE.len());
            if buf[..available] != CONNECTION_PREFACE[..available] {
                return Ok(Some(ClientProtocol::Http1));
            }
            if available == CONNECTION_PREFACE.len() {
                return Ok(Some(ClientProtocol::Http2));
            }

            if self.ctx.tcp_mut().fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    async fn serve_http1(&mut self) -> Result<()> {
        let mut request = HttpRequest::default();
        let mut response = HttpResponse::new();

        loop {
            let (head, body) = match self.read_request().await {
                Ok(Some(parts)) => parts,
                Ok(None) => {
                    debug!("peer closed the connection.");
                    break;
                },
                Err(e) => {
                    self.reject(e).await;
                    break;
                },
            };

            let body = if body.is_empty() { None } else { Some(body) };
            request.init_for_next_request(Some(HttpRequest::new(head.method, head.path, head.protocol, head.headers, body)));
            let close = request.wants_close();
            debug!("connection {} serves {} {}.", self.ctx.virtual_connection().id(), request.method, request.path);

            let h2c = prepare_h2c_upgrade(&mut request, self.ctx.virtual_connection(), &self.config, &self.dispatcher);
            if h2c != H2cPreparation::Prepared {
                response = self.dispatcher.dispatch(&mut request);
            }
            // Prepared h2c requests are answered on stream 1 after the upgrade.

            if close && !request.is_upgrade_in_progress() {
                response.set_header("Connection", "close");
            }

            if self.ctx.finish_connection(&mut request, &mut response).await {
                info!("connection {} handed to the upgrade handler.", self.ctx.virtual_connection().id());
                return Ok(());
            }
            if close || self.ctx.tcp().is_released() {
                break;
            }
        }
        Ok(())
    }

    async fn read_request(&mut self) -> Result<Option<(RequestHead, Bytes)>, RequestError> {
        let Some(head) = self.read_head().await? else {
            return Ok(None);
        };

        let framing = self.reader.body_framing(&head.headers)?;
        loop {
            if let Some(body) = self.reader.parse_body(framing, self.ctx.tcp_mut().read_ahead_mut())? {
                return Ok(Some((head, body)));
            }
            if self.ctx.tcp_mut().fill().await? == 0 {
                return Err(RequestError::Malformed("EOF before the end of the body".to_string()));
            }
        }
    }

    async fn read_head(&mut self) -> Result<Option<RequestHead>, RequestError> {
        loop {
            if let Some(head) = self.reader.parse_head(self.ctx.tcp_mut().read_ahead_mut())? {
                return Ok(Some(head));
            }
            if self.ctx.tcp_mut().fill().await? == 0 {
                if self.ctx.tcp_mut().read_ahead_mut().is_empty() {
                    return Ok(None);
                }
                return Err(RequestError::Malformed("EOF before header termination.".to_string()));
            }
        }
    }

    async fn reject(&mut self, error: RequestError) {
        warn!("connection {} rejects request: {}", self.ctx.virtual_connection().id(), error);
        let Some(status) = error.status() else {
            return;
        };

        let mut response = HttpResponse::with_status_code(status);
        response.set_header("Connection", "close");
        if let Err(e) = response.finish(self.ctx.tcp_mut()).await {
            debug!("failed to send {}: {:#}", status, e);
        }
    }
}
