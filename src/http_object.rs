use std::collections::HashMap;
use std::fmt;
use anyhow::{bail, Result};
use bytes::{BufMut, Bytes, BytesMut};
use crate::http_status::HttpStatus;
use crate::http_type::{HttpProtocol, Method};
use crate::upgrade::thread_context::ContextSnapshot;
use crate::upgrade::transport::TcpConnectionContext;
use crate::upgrade::upgrade_handler::HttpUpgradeHandler;

pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub protocol: HttpProtocol,
    // Lowercased names.
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,

    upgrade_handler: Option<Box<dyn HttpUpgradeHandler>>,
    saved_context: Option<ContextSnapshot>,
    finished: bool,
}

impl HttpRequest {

    pub fn new(method: Method, path: String, protocol: HttpProtocol, headers: HashMap<String, String>, body: Option<Bytes>) -> Self {
        HttpRequest {
            method,
            path,
            protocol,
            headers,
            body,
            upgrade_handler: None,
            saved_context: None,
            finished: false,
        }
    }

    /// Builds a request from a decoded HTTP/2 header list. `:authority`
    /// becomes `host` unless one was sent.
    pub fn from_h2_headers(fields: Vec<(String, String)>, body: Bytes) -> Result<Self> {
        let mut method = None;
        let mut path = None;
        let mut headers: HashMap<String, String> = HashMap::new();

        for (name, value) in fields {
            match name.as_str() {
                ":method" => {
                    let parsed = value.parse::<Method>()
                        .map_err(|_| anyhow::anyhow!("unsupported method {}", value))?;
                    method = Some(parsed);
                },
                ":path" => path = Some(value),
                ":authority" => {
                    headers.entry("host".to_string()).or_insert(value);
                },
                ":scheme" => {},
                _ => {
                    //   If there are multiple Cookie header fields after decompression,
                    //   these MUST be concatenated into a single octet string using the
                    //   two-octet delimiter of 0x3B, 0x20 (the ASCII string "; ")
                    let separator = if name == "cookie" { "; " } else { ", " };
                    headers.entry(name)
                        .and_modify(|existing| {
                            existing.push_str(separator);
                            existing.push_str(&value);
                        })
                        .or_insert(value);
                },
            }
        }

        let (Some(method), Some(path)) = (method, path) else {
            bail!("request without :method or :path");
        };
        let body = if body.is_empty() { None } else { Some(body) };
        Ok(HttpRequest::new(method, path, HttpProtocol::HTTP2, headers, body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// True if the comma separated header `name` carries `token`.
    pub fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// HTTP/1.0 closes unless asked to keep alive; HTTP/1.1 keeps alive unless asked to close.
    pub fn wants_close(&self) -> bool {
        match self.protocol {
            HttpProtocol::HTTP1 => !self.header_has_token("connection", "keep-alive"),
            _ => self.header_has_token("connection", "close"),
        }
    }

    /// Copy of the request line, headers and body without any upgrade state.
    pub fn clone_message(&self) -> HttpRequest {
        HttpRequest::new(self.method, self.path.clone(), self.protocol, self.headers.clone(), self.body.clone())
    }

    /// Hands the connection to `handler` once the current response is written.
    pub fn upgrade(&mut self, handler: Box<dyn HttpUpgradeHandler>) {
        self.upgrade_handler = Some(handler);
    }

    pub fn is_upgrade_in_progress(&self) -> bool {
        self.upgrade_handler.is_some()
    }

    pub fn take_upgrade_handler(&mut self) -> Option<Box<dyn HttpUpgradeHandler>> {
        self.upgrade_handler.take()
    }

    pub fn save_context(&mut self, snapshot: ContextSnapshot) {
        self.saved_context = Some(snapshot);
    }

    pub fn take_saved_context(&mut self) -> Option<ContextSnapshot> {
        self.saved_context.take()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the body consumed.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            bail!("request {} {} already finished", self.method, self.path);
        }
        self.finished = true;
        Ok(())
    }

    /// `None` clears the request for reuse; `Some` replaces it.
    pub fn init_for_next_request(&mut self, next: Option<HttpRequest>) {
        match next {
            Some(next) => *self = next,
            None => {
                self.headers.clear();
                self.body = None;
                self.upgrade_handler = None;
                self.saved_context = None;
                self.finished = false;
            },
        }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        HttpRequest::new(Method::GET, "/".to_string(), HttpProtocol::HTTP11, HashMap::new(), None)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("protocol", &self.protocol)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(Bytes::len))
            .field("upgrade_in_progress", &self.is_upgrade_in_progress())
            .finish()
    }
}


#[derive(Debug)]
pub struct HttpResponse {
    status_code: HttpStatus,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    committed: bool,
    finished: bool,
}

impl Default for HttpResponse {
    fn default() -> Self {
        HttpResponse { status_code: HttpStatus::OK, headers: Vec::new(), body: None, committed: false, finished: false }
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_code(status_code: HttpStatus) -> Self {
        HttpResponse { status_code, ..Self::default() }
    }

    pub fn set_status_code(&mut self, status_code: HttpStatus) {
        self.status_code = status_code;
    }

    pub fn get_status_code(&self) -> HttpStatus {
        self.status_code
    }

    /// Replaces any header with the same name, ignoring case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    // HTTP/1.1 200 OK
    // Content-Type: text/plain; charset=utf-8
    // Content-Length: 14
    //
    // Hello, World!
    pub fn encode_head(&self, protocol: HttpProtocol) -> BytesMut {
        let mut head = BytesMut::with_capacity(128);
        let version = match protocol {
            HttpProtocol::HTTP1 => HttpProtocol::HTTP1.as_str(),
            _ => HttpProtocol::HTTP11.as_str(),
        };
        head.put_slice(format!("{} {} {}\r\n", version, self.status_code.code(), self.status_code.reason_phrase()).as_bytes());

        for (name, value) in &self.headers {
            head.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if self.status_code.allows_body() && self.header("content-length").is_none() {
            let length = self.body.as_ref().map(Bytes::len).unwrap_or(0);
            head.put_slice(format!("Content-Length: {}\r\n", length).as_bytes());
        }
        head.put_slice(b"\r\n");
        head
    }

    /// Writes the status line and headers only. Used for 101 responses.
    pub async fn commit(&mut self, tcp: &mut TcpConnectionContext) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        let head = self.encode_head(HttpProtocol::HTTP11);
        tcp.write_all(&head).await?;
        self.committed = true;
        Ok(())
    }

    /// Writes the full response unless the head was already committed.
    pub async fn finish(&mut self, tcp: &mut TcpConnectionContext) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.committed {
            return Ok(());
        }

        let mut out = self.encode_head(HttpProtocol::HTTP11);
        if let Some(body) = &self.body {
            if self.status_code.allows_body() {
                out.put_slice(body);
            }
        }
        tcp.write_all(&out).await?;
        self.committed = true;
        Ok(())
    }

    pub fn init_for_next_response(&mut self, next: Option<HttpResponse>) {
        *self = next.unwrap_or_default();
    }
}
