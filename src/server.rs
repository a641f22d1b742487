use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::spawn;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{debug, info, info_span, warn, Instrument};
use crate::config::HttpChannelConfig;
use crate::connection::ConnectionOwner;
use crate::dispatcher::{Dispatcher, Handler};
use crate::ffdc::FailureRecorder;
use crate::http_type::Method;

pub struct ServerBuilder<'a> {
    host: Option<&'a str>,
    port: Option<u16>,
    config: HttpChannelConfig,
    dispatcher: Dispatcher
}


impl <'a> ServerBuilder<'a> {

    pub fn new() -> Self {
        ServerBuilder { host: None, port: None, config: HttpChannelConfig::default(), dispatcher: Dispatcher::new() }
    }

    pub fn host(&mut self, host: &'a str) -> &mut Self {
        self.host.replace(host);
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port.replace(port);
        self
    }

    pub fn config(&mut self, config: HttpChannelConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// A route registered twice keeps the first handler.
    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> &mut Self {
        if let Err(e) = self.dispatcher.add(method, path, handler) {
            warn!("route not added: {:#}", e);
        }
        self
    }

    pub fn build(self) -> Result<Server> {
        let host = self.host.context("server host is not set")?;
        let port = self.port.context("server port is not set")?;
        Ok(Server {
            host: host.to_string(),
            port,
            config: Arc::new(self.config),
            dispatcher: Arc::new(self.dispatcher),
            ffdc: Arc::new(FailureRecorder::new()),
            next_connection_id: AtomicU64::new(1),
        })
    }
}

impl Default for ServerBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}


pub struct Server {
    host: String,
    port: u16,
    config: Arc<HttpChannelConfig>,
    dispatcher: Arc<Dispatcher>,
    ffdc: Arc<FailureRecorder>,
    next_connection_id: AtomicU64,
}

impl Server {

    pub fn failure_recorder(&self) -> Arc<FailureRecorder> {
        self.ffdc.clone()
    }

    pub fn config(&self) -> &HttpChannelConfig {
        &self.config
    }

    pub async fn serve(&self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await
            .with_context(|| format!("failed to bind {}", addr))?;
        self.serve_listener(listener).await
    }

    pub async fn serve_listener(&self, listener: TcpListener) -> Result<()> {
        let local_addr: Option<SocketAddr> = listener.local_addr().ok();
        info!("server listening on {:?}.", local_addr);
        let mut incoming = TcpListenerStream::new(listener);

        while let Some(accepted) = incoming.next().await {
            let tcp_stream = match accepted {
                Ok(tcp_stream) => tcp_stream,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                },
            };

            let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
            let addrs = (tcp_stream.local_addr().ok(), tcp_stream.peer_addr().ok());
            debug!("connection {} accepted from {:?}.", id, addrs.1);

            let owner = ConnectionOwner::new(Box::new(tcp_stream),
                                             id,
                                             addrs,
                                             self.config.clone(),
                                             self.dispatcher.clone(),
                                             self.ffdc.clone());

            // The task owns everything it touches, so the future is 'static.
            let span = info_span!("connection", id);
            spawn(async move {
                if let Err(e) = owner.serve().await {
                    warn!("connection failed: {:#}", e);
                }
            }.instrument(span));
        }

        Ok(())
    }
}
