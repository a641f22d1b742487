mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, DuplexStream};
use h2_channel::ffdc::FailureRecorder;
use h2_channel::http_object::{HttpRequest, HttpResponse};
use h2_channel::http_type::{HttpProtocol, Method};
use h2_channel::upgrade::connection_context::{ConnectionContext, UpgradeState};
use h2_channel::upgrade::thread_context::{ContextSnapshot, ContextStack};
use h2_channel::upgrade::transport::{DeviceLink, DispatcherLink, TcpConnectionContext};
use h2_channel::upgrade::upgrade_handler::HttpUpgradeHandler;
use h2_channel::upgrade::virtual_connection::{VirtualConnection, CLOSE_NON_UPGRADED_STREAMS, H2_INIT_ERROR, UPGRADED_CONNECTION};
use h2_channel::upgrade::web_connection::{UpgradedConnection, UpgradedConnectionKind};

const SOURCE: &str = "ConnectionContext.finish_connection";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    kind: UpgradedConnectionKind,
    user: Option<String>,
    context_depth: usize,
    has_dispatcher_link: bool,
}

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

struct RecordingHandler {
    protocol: &'static str,
    web_socket: bool,
    behaviour: Behaviour,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl HttpUpgradeHandler for RecordingHandler {
    fn protocol(&self) -> &str {
        self.protocol
    }

    fn is_web_socket(&self) -> bool {
        self.web_socket
    }

    fn init(self: Box<Self>, connection: UpgradedConnection, context: &ContextStack) -> anyhow::Result<()> {
        if let Behaviour::Panic = self.behaviour {
            panic!("handler exploded");
        }
        self.seen.lock().unwrap().push(Seen {
            kind: connection.kind(),
            user: context.lookup("user").map(str::to_string),
            context_depth: context.depth(),
            has_dispatcher_link: connection.dispatcher_link().is_some(),
        });
        match self.behaviour {
            Behaviour::Fail => anyhow::bail!("handler refused the connection"),
            _ => Ok(()),
        }
    }
}

struct Fixture {
    ctx: ConnectionContext,
    client: DuplexStream,
    vc: VirtualConnection,
    ffdc: Arc<FailureRecorder>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

fn fixture(dispatcher_link: DispatcherLink) -> Fixture {
    common::init_test_logging();
    let (client, server) = duplex(64 * 1024);
    let vc = VirtualConnection::new(7);
    let ffdc = Arc::new(FailureRecorder::new());
    let tcp = TcpConnectionContext::new(Box::new(server), None, None);
    let ctx = ConnectionContext::new(tcp, DeviceLink::new(7), dispatcher_link, vc.clone(), ffdc.clone());
    Fixture { ctx, client, vc, ffdc, seen: Arc::new(Mutex::new(Vec::new())) }
}

fn request_with(fixture: &Fixture, protocol: &'static str, web_socket: bool, behaviour: Behaviour) -> HttpRequest {
    let headers: HashMap<String, String> = [("host".to_string(), "localhost".to_string())].into();
    let mut request = HttpRequest::new(Method::GET, "/chat".to_string(), HttpProtocol::HTTP11, headers, None);
    request.upgrade(Box::new(RecordingHandler { protocol, web_socket, behaviour, seen: fixture.seen.clone() }));
    request
}

fn ok_response() -> HttpResponse {
    let mut response = HttpResponse::new();
    response.set_body("plain");
    response
}

const SWITCHING: &str = "HTTP/1.1 101 Switching Protocols\r\n";

#[tokio::test]
async fn web_socket_handler_gets_web_transport_connection() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = request_with(&f, "websocket", true, Behaviour::Succeed);
    let mut response = ok_response();

    assert!(f.ctx.finish_connection(&mut request, &mut response).await);
    assert_eq!(f.ctx.transitions(), &[
        UpgradeState::Normal,
        UpgradeState::UpgradeRequested,
        UpgradeState::Upgrading,
        UpgradeState::Upgraded,
        UpgradeState::Finished,
    ]);
    assert!(f.ctx.tcp().is_released());

    let seen = f.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, UpgradedConnectionKind::WebTransport);
    assert!(!seen[0].has_dispatcher_link);

    assert!(f.vc.is_flag_set(UPGRADED_CONNECTION));
    assert!(!f.vc.is_flag_set(CLOSE_NON_UPGRADED_STREAMS));

    drop(f.ctx);
    let written = common::read_to_end(&mut f.client).await;
    assert_eq!(written, format!("{}Upgrade: websocket\r\nConnection: Upgrade\r\n\r\n", SWITCHING));
}

#[tokio::test]
async fn other_handlers_close_non_upgraded_streams() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = request_with(&f, "h2c", false, Behaviour::Succeed);
    let mut response = ok_response();

    assert!(f.ctx.finish_connection(&mut request, &mut response).await);
    let seen = f.seen.lock().unwrap().clone();
    assert_eq!(seen[0].kind, UpgradedConnectionKind::Upgraded);
    assert!(seen[0].has_dispatcher_link);
    assert!(f.vc.is_flag_set(CLOSE_NON_UPGRADED_STREAMS));
    assert!(f.vc.is_flag_set(UPGRADED_CONNECTION));
    assert_eq!(f.ffdc.total(), 0);
}

#[tokio::test]
async fn netty_dispatcher_link_gets_netty_connection() {
    let mut f = fixture(DispatcherLink::netty(7));
    let mut request = request_with(&f, "h2c", false, Behaviour::Succeed);
    let mut response = ok_response();

    assert!(f.ctx.finish_connection(&mut request, &mut response).await);
    let seen = f.seen.lock().unwrap().clone();
    assert_eq!(seen[0].kind, UpgradedConnectionKind::NettyUpgraded);
}

#[tokio::test]
async fn h2_init_error_answers_over_http11() {
    let mut f = fixture(DispatcherLink::new(7));
    f.vc.set_flag(H2_INIT_ERROR);
    let mut request = request_with(&f, "h2c", false, Behaviour::Succeed);
    let mut response = ok_response();

    assert!(!f.ctx.finish_connection(&mut request, &mut response).await);
    assert_eq!(f.ctx.transitions(), &[UpgradeState::Normal, UpgradeState::Finished]);
    assert!(f.seen.lock().unwrap().is_empty());
    assert!(!f.ctx.tcp().is_released());
    assert!(!request.is_upgrade_in_progress());
    assert!(!f.vc.is_flag_set(UPGRADED_CONNECTION));

    drop(f.ctx);
    let written = common::read_to_end(&mut f.client).await;
    assert_eq!(written, "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nplain");
}

#[tokio::test]
async fn failing_handler_is_recorded_and_exchange_is_reset() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = request_with(&f, "h2c", false, Behaviour::Fail);
    request.save_context(ContextSnapshot::new("app"));
    let mut response = ok_response();

    assert!(!f.ctx.finish_connection(&mut request, &mut response).await);
    assert_eq!(f.ffdc.count(SOURCE), 1);
    assert!(!f.ctx.transitions().contains(&UpgradeState::Upgraded));
    assert_eq!(f.ctx.state(), UpgradeState::Finished);

    assert!(!request.is_finished());
    assert!(request.take_saved_context().is_none());
    assert!(!request.is_upgrade_in_progress());
    assert!(!response.is_committed());
    assert_eq!(f.ctx.context_stack().depth(), 0);

    // The 101 head was already on the wire when init failed.
    drop(f.ctx);
    let written = common::read_to_end(&mut f.client).await;
    assert!(written.starts_with(SWITCHING));
}

#[tokio::test]
async fn panicking_handler_is_recorded() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = request_with(&f, "h2c", false, Behaviour::Panic);
    request.save_context(ContextSnapshot::new("app").with_entry("user", "alice"));
    let mut response = ok_response();

    assert!(!f.ctx.finish_connection(&mut request, &mut response).await);
    assert_eq!(f.ffdc.count(SOURCE), 1);
    assert_eq!(f.ctx.context_stack().depth(), 0);
    assert_eq!(f.ctx.state(), UpgradeState::Finished);
}

#[tokio::test]
async fn saved_context_is_active_during_init() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = request_with(&f, "websocket", true, Behaviour::Succeed);
    request.save_context(ContextSnapshot::new("app").with_entry("user", "alice"));
    let mut response = ok_response();

    assert!(f.ctx.finish_connection(&mut request, &mut response).await);
    let seen = f.seen.lock().unwrap().clone();
    assert_eq!(seen[0].user.as_deref(), Some("alice"));
    assert_eq!(seen[0].context_depth, 1);
    assert_eq!(f.ctx.context_stack().depth(), 0);
}

#[tokio::test]
async fn plain_request_is_not_upgraded() {
    let mut f = fixture(DispatcherLink::new(7));
    let mut request = HttpRequest::default();
    let mut response = ok_response();

    assert!(!f.ctx.finish_connection(&mut request, &mut response).await);
    assert_eq!(f.ctx.transitions(), &[UpgradeState::Normal, UpgradeState::Finished]);
    assert_eq!(f.ffdc.total(), 0);
}
