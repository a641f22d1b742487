use std::sync::Arc;
use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use tracing::{info, info_span, warn, Instrument};
use crate::config::HttpChannelConfig;
use crate::dispatcher::Dispatcher;
use crate::http2::frame_settings::SettingsFrame;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_connection::Http2Connection;
use crate::http2::http2_frame::{FrameHeader, FrameType};
use crate::http_object::HttpRequest;
use crate::http_type::HttpProtocol;
use crate::upgrade::thread_context::ContextStack;
use crate::upgrade::upgrade_handler::HttpUpgradeHandler;
use crate::upgrade::virtual_connection::{VirtualConnection, H2_INIT_ERROR};
use crate::upgrade::web_connection::UpgradedConnection;

pub const H2C_PROTOCOL: &str = "h2c";
const HTTP2_SETTINGS: &str = "http2-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2cPreparation {
    /// The request did not ask for h2c.
    NotRequested,
    /// An upgrade handler is installed on the request.
    Prepared,
    /// The `HTTP2-Settings` header was unusable; `H2_INIT_ERROR` is set.
    Rejected,
}

//     GET / HTTP/1.1
//     Host: server.example.com
//     Connection: Upgrade, HTTP2-Settings
//     Upgrade: h2c
//     HTTP2-Settings: <base64url encoding of HTTP/2 SETTINGS payload>
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-3.2)
pub fn is_h2c_upgrade_request(request: &HttpRequest) -> bool {
    request.protocol == HttpProtocol::HTTP11
        && request.header_has_token("upgrade", H2C_PROTOCOL)
        && request.header_has_token("connection", "upgrade")
        && request.header(HTTP2_SETTINGS).is_some()
}

//   The content of the HTTP2-Settings header field is the payload of a
//   SETTINGS frame (Section 6.5), encoded as a base64url string (that is,
//   the URL- and filename-safe Base64 encoding described in Section 5 of
//   [RFC4648], with any trailing '=' characters omitted).
pub fn decode_http2_settings(value: &str) -> anyhow::Result<SettingsFrame> {
    let payload = URL_SAFE_NO_PAD.decode(value.trim().trim_end_matches('='))
        .context("HTTP2-Settings is not base64url")?;

    let header = FrameHeader::new(FrameType::Settings, 0, 0, false, payload.len() as u32);
    let frame = SettingsFrame::decode(header, Bytes::from(payload));
    frame.validate(&ConnectionSettings::default())?;
    Ok(frame)
}

/// Installs an h2c upgrade handler on `request` if it asks for one.
pub fn prepare_h2c_upgrade(request: &mut HttpRequest,
                           vc: &VirtualConnection,
                           config: &Arc<HttpChannelConfig>,
                           dispatcher: &Arc<Dispatcher>) -> H2cPreparation {
    if !config.http2_enabled() || !is_h2c_upgrade_request(request) {
        return H2cPreparation::NotRequested;
    }
    // An earlier init error keeps the whole connection on HTTP/1.1.
    if vc.is_flag_set(H2_INIT_ERROR) {
        return H2cPreparation::NotRequested;
    }

    let settings = request.header(HTTP2_SETTINGS).unwrap_or_default();
    match decode_http2_settings(settings) {
        Ok(peer_settings) => {
            let handler = H2cUpgradeHandler::new(peer_settings, request.clone_message(), config.clone(), dispatcher.clone());
            request.upgrade(Box::new(handler));
            H2cPreparation::Prepared
        },
        Err(e) => {
            warn!("connection {} stays on HTTP/1.1, h2c upgrade failed: {:#}", vc.id(), e);
            vc.set_flag(H2_INIT_ERROR);
            H2cPreparation::Rejected
        },
    }
}


pub struct H2cUpgradeHandler {
    peer_settings: SettingsFrame,
    request: HttpRequest,
    config: Arc<HttpChannelConfig>,
    dispatcher: Arc<Dispatcher>,
}

impl H2cUpgradeHandler {
    pub fn new(peer_settings: SettingsFrame, request: HttpRequest, config: Arc<HttpChannelConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        H2cUpgradeHandler { peer_settings, request, config, dispatcher }
    }
}

impl HttpUpgradeHandler for H2cUpgradeHandler {

    fn protocol(&self) -> &str {
        H2C_PROTOCOL
    }

    fn init(self: Box<Self>, connection: UpgradedConnection, _context: &ContextStack) -> anyhow::Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .context("h2c upgrade needs a tokio runtime")?;

        let connection_id = connection.virtual_connection().id();
        let (transport, read_ahead) = connection.into_transport()?;

        let mut h2 = Http2Connection::new(self.config, self.dispatcher);
        h2.apply_upgrade_settings(&self.peer_settings)?;

        let request = self.request;
        let span = info_span!("h2_connection", id = connection_id, upgraded = true);
        handle.spawn(async move {
            info!("connection serves HTTP/2 after h2c upgrade.");
            if let Err(e) = h2.serve(transport, read_ahead, Some(request)).await {
                warn!("h2c connection failed: {:#}", e);
            }
        }.instrument(span));
        Ok(())
    }
}
