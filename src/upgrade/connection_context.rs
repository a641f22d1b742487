use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use anyhow::{anyhow, Result};
use tracing::{debug, info};
use crate::ffdc::FailureRecorder;
use crate::http_object::{HttpRequest, HttpResponse};
use crate::http_status::HttpStatus;
use crate::upgrade::thread_context::ContextStack;
use crate::upgrade::transport::{DeviceLink, DispatcherLink, TcpConnectionContext};
use crate::upgrade::virtual_connection::{VirtualConnection, CLOSE_NON_UPGRADED_STREAMS, H2_INIT_ERROR, UPGRADED_CONNECTION};
use crate::upgrade::web_connection::{
    NettyUpgradedWebConnection,
    UpgradedConnection,
    UpgradedWebConnection,
    WebTransportConnection,
};

const FFDC_SOURCE: &str = "ConnectionContext.finish_connection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Normal,
    UpgradeRequested,
    Upgrading,
    Upgraded,
    Finished,
}

/// Per-connection context of the HTTP/1.1 side. `finish_connection` runs
/// after every request and performs a pending protocol upgrade.
pub struct ConnectionContext {
    tcp: TcpConnectionContext,
    device_link: DeviceLink,
    dispatcher_link: DispatcherLink,
    vc: VirtualConnection,
    context_stack: ContextStack,
    ffdc: Arc<FailureRecorder>,

    state: UpgradeState,
    transitions: Vec<UpgradeState>,
}

impl ConnectionContext {

    pub fn new(tcp: TcpConnectionContext,
               device_link: DeviceLink,
               dispatcher_link: DispatcherLink,
               vc: VirtualConnection,
               ffdc: Arc<FailureRecorder>) -> Self {
        ConnectionContext {
            tcp,
            device_link,
            dispatcher_link,
            vc,
            context_stack: ContextStack::new(),
            ffdc,
            state: UpgradeState::Normal,
            transitions: vec![UpgradeState::Normal],
        }
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    /// States visited while finishing the last request.
    pub fn transitions(&self) -> &[UpgradeState] {
        &self.transitions
    }

    pub fn is_upgraded(&self) -> bool {
        self.transitions.contains(&UpgradeState::Upgraded)
    }

    pub fn tcp(&self) -> &TcpConnectionContext {
        &self.tcp
    }

    pub fn tcp_mut(&mut self) -> &mut TcpConnectionContext {
        &mut self.tcp
    }

    pub fn virtual_connection(&self) -> &VirtualConnection {
        &self.vc
    }

    pub fn context_stack(&self) -> &ContextStack {
        &self.context_stack
    }

    fn transition(&mut self, next: UpgradeState) {
        debug!("connection {} upgrade state {:?} -> {:?}.", self.vc.id(), self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Finishes the request/response pair. Returns true when the connection
    /// now belongs to an upgrade handler.
    ///
    /// Whatever happens during the upgrade, the response and request are
    /// finished and both are reset for the next exchange.
    pub async fn finish_connection(&mut self, request: &mut HttpRequest, response: &mut HttpResponse) -> bool {
        self.state = UpgradeState::Normal;
        self.transitions.clear();
        self.transitions.push(UpgradeState::Normal);

        if self.vc.is_flag_set(H2_INIT_ERROR) {
            debug!("connection {} skips upgrade after h2 init error.", self.vc.id());
            // The request is answered over HTTP/1.1.
            drop(request.take_upgrade_handler());
        } else if request.is_upgrade_in_progress() {
            self.transition(UpgradeState::UpgradeRequested);
            if let Err(e) = self.upgrade(request, response).await {
                self.ffdc.record(FFDC_SOURCE, "upgrade", &format!("{:#}", e));
            }
        }

        if let Err(e) = response.finish(&mut self.tcp).await {
            self.ffdc.record(FFDC_SOURCE, "response.finish", &format!("{:#}", e));
        }
        if let Err(e) = request.finish() {
            self.ffdc.record(FFDC_SOURCE, "request.finish", &format!("{:#}", e));
        }
        request.init_for_next_request(None);
        response.init_for_next_response(None);

        self.transition(UpgradeState::Finished);
        self.is_upgraded()
    }

    async fn upgrade(&mut self, request: &mut HttpRequest, response: &mut HttpResponse) -> Result<()> {
        let handler = request.take_upgrade_handler()
            .ok_or_else(|| anyhow!("upgrade requested without a handler"))?;

        response.set_status_code(HttpStatus::SwitchingProtocols);
        response.set_header("Upgrade", handler.protocol());
        response.set_header("Connection", "Upgrade");
        response.commit(&mut self.tcp).await?;

        self.transition(UpgradeState::Upgrading);
        let tcp = self.tcp.capture()
            .ok_or_else(|| anyhow!("transport released before upgrade"))?;

        let device_link = self.device_link.clone();
        let vc = self.vc.clone();
        let connection = if handler.is_web_socket() {
            UpgradedConnection::WebTransport(WebTransportConnection::new(tcp, device_link, vc.clone()))
        } else {
            vc.set_flag(CLOSE_NON_UPGRADED_STREAMS);
            let dispatcher_link = self.dispatcher_link.clone();
            if dispatcher_link.is_netty() {
                UpgradedConnection::NettyUpgraded(NettyUpgradedWebConnection::new(tcp, device_link, dispatcher_link, vc.clone()))
            } else {
                UpgradedConnection::Upgraded(UpgradedWebConnection::new(tcp, device_link, dispatcher_link, vc.clone()))
            }
        };
        let kind = connection.kind();
        vc.set_flag(UPGRADED_CONNECTION);

        let protocol = handler.protocol().to_string();
        let saved = request.take_saved_context();
        let outcome = {
            let scope = self.context_stack.enter(saved);
            catch_unwind(AssertUnwindSafe(|| handler.init(connection, &scope)))
        };

        match outcome {
            Ok(Ok(())) => {
                self.transition(UpgradeState::Upgraded);
                info!("connection {} upgraded to {} over {:?}.", self.vc.id(), protocol, kind);
                Ok(())
            },
            Ok(Err(e)) => Err(e.context(format!("{} upgrade handler init failed", protocol))),
            Err(panic) => Err(anyhow!("{} upgrade handler panicked: {}", protocol, panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
