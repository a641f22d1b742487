use std::collections::HashMap;
use std::io;
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use crate::http_status::HttpStatus;
use crate::http_type::{HttpProtocol, Method};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("unsupported method {0}")]
    UnsupportedMethod(String),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    /// Status of the response sent before the connection is closed.
    pub fn status(&self) -> Option<HttpStatus> {
        match self {
            RequestError::HeaderTooLarge { .. } => Some(HttpStatus::RequestHeaderFieldsTooLarge),
            RequestError::Malformed(_) | RequestError::UnsupportedVersion(_) => Some(HttpStatus::BadRequest),
            RequestError::UnsupportedMethod(_) => Some(HttpStatus::NotImplemented),
            RequestError::Io(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub protocol: HttpProtocol,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Empty,
    ContentLength(usize),
    Chunked,
}

/// Incremental HTTP/1.x request reader over the connection's read buffer.
/// Nothing is consumed until a complete head or body is buffered.
pub struct Http11Reader {
    max_header_bytes: usize,
}

impl Http11Reader {

    pub fn new(max_header_bytes: usize) -> Self {
        Http11Reader { max_header_bytes }
    }

    pub fn parse_head(&self, buf: &mut BytesMut) -> Result<Option<RequestHead>, RequestError> {
        let Some(end) = find(buf, b"\r\n\r\n") else {
            if buf.len() > self.max_header_bytes {
                return Err(RequestError::HeaderTooLarge { limit: self.max_header_bytes });
            }
            return Ok(None);
        };

        let head_length = end + 4;
        if head_length > self.max_header_bytes {
            return Err(RequestError::HeaderTooLarge { limit: self.max_header_bytes });
        }

        let head = buf.split_to(head_length);
        let head = std::str::from_utf8(&head)
            .map_err(|_| RequestError::Malformed("Invalid UTF-8 sequence".to_string()))?;

        let (request_line, header_string) = head.split_once("\r\n").unwrap_or((head, ""));
        let (method, path, protocol) = self.parse_preface(request_line)?;
        let headers = self.parse_header(header_string);

        Ok(Some(RequestHead { method, path, protocol, headers }))
    }

    pub fn parse_preface(&self, preface_message: &str) -> Result<(Method, String, HttpProtocol), RequestError> {
        let mut it = preface_message.split_whitespace();
        let (method, path, version) = match (it.next(), it.next(), it.next(), it.next()) {
            (Some(m), Some(p), Some(v), None) => (m, p, v),
            _ => return Err(RequestError::Malformed(format!("bad request line {:?}", preface_message))),
        };

        let method = method.parse::<Method>()
            .map_err(|_| RequestError::UnsupportedMethod(method.to_string()))?;
        let protocol = match version.parse::<HttpProtocol>() {
            Ok(p @ (HttpProtocol::HTTP1 | HttpProtocol::HTTP11)) => p,
            _ => return Err(RequestError::UnsupportedVersion(version.to_string())),
        };
        if !path.starts_with('/') && path != "*" {
            return Err(RequestError::Malformed(format!("bad request target {}", path)));
        }

        Ok((method, path.to_string(), protocol))
    }

    fn parse_header(&self, header_string: &str) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = HashMap::new();

        for line in header_string.split("\r\n") {
            if line.is_empty() {
                break;
            }
            // Don't use line.split(": ") because of invalid request
            let mut kv = line.splitn(2, ':');
            if let (Some(key), Some(value)) = (kv.next(), kv.next()) {
                headers.entry(key.trim().to_ascii_lowercase())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(value.trim());
                    })
                    .or_insert_with(|| value.trim().to_string());
            }
        }

        headers
    }

    /// Transfer-Encoding takes precedence over Content-Length.
    pub fn body_framing(&self, headers: &HashMap<String, String>) -> Result<BodyFraming, RequestError> {
        if let Some(encoding) = headers.get("transfer-encoding") {
            let last = encoding.rsplit(',').next().unwrap_or("").trim();
            if last.eq_ignore_ascii_case("chunked") {
                return Ok(BodyFraming::Chunked);
            }
            return Err(RequestError::Malformed(format!("unsupported transfer-encoding {}", encoding)));
        }

        match headers.get("content-length") {
            None => Ok(BodyFraming::Empty),
            Some(value) => {
                let length = value.trim().parse::<usize>()
                    .map_err(|_| RequestError::Malformed(format!("bad content-length {}", value)))?;
                Ok(if length == 0 { BodyFraming::Empty } else { BodyFraming::ContentLength(length) })
            },
        }
    }

    pub fn parse_body(&self, framing: BodyFraming, buf: &mut BytesMut) -> Result<Option<Bytes>, RequestError> {
        match framing {
            BodyFraming::Empty => Ok(Some(Bytes::new())),
            BodyFraming::ContentLength(length) if buf.len() >= length => Ok(Some(buf.split_to(length).freeze())),
            BodyFraming::ContentLength(_) => Ok(None),
            BodyFraming::Chunked => self.parse_chunked(buf),
        }
    }

    //   chunked-body   = *chunk
    //                    last-chunk
    //                    trailer-part
    //                    CRLF
    //
    //   chunk          = chunk-size [ chunk-ext ] CRLF
    //                    chunk-data CRLF
    //  (https://datatracker.ietf.org/doc/html/rfc7230#section-4.1)
    fn parse_chunked(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, RequestError> {
        let mut pos = 0;
        let mut body = BytesMut::new();

        loop {
            let Some(line_end) = find(&buf[pos..], b"\r\n") else {
                return Ok(None);
            };
            let line = std::str::from_utf8(&buf[pos..pos + line_end])
                .map_err(|_| RequestError::Malformed("chunk size is not utf-8".to_string()))?;
            let size_token = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_token, 16)
                .map_err(|_| RequestError::Malformed(format!("bad chunk size {:?}", size_token)))?;
            pos += line_end + 2;

            if size == 0 {
                // Trailers are read and dropped.
                loop {
                    let Some(end) = find(&buf[pos..], b"\r\n") else {
                        return Ok(None);
                    };
                    pos += end + 2;
                    if end == 0 {
                        break;
                    }
                }
                buf.advance(pos);
                return Ok(Some(body.freeze()));
            }

            if buf.len() < pos + size + 2 {
                return Ok(None);
            }
            body.extend_from_slice(&buf[pos..pos + size]);
            if &buf[pos + size..pos + size + 2] != b"\r\n" {
                return Err(RequestError::Malformed("chunk data not followed by CRLF".to_string()));
            }
            pos += size + 2;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn waits_for_complete_head() {
        let reader = Http11Reader::new(1024);
        let mut buf = buffer(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n");
        assert_eq!(reader.parse_head(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"Accept: */*\r\naccept: text/plain\r\n\r\nnext");
        let head = reader.parse_head(&mut buf).unwrap().unwrap();
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.path, "/hello");
        assert_eq!(head.protocol, HttpProtocol::HTTP11);
        assert_eq!(head.headers.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(head.headers.get("accept").map(String::as_str), Some("*/*, text/plain"));
        assert_eq!(&buf[..], b"next");
    }

    #[test]
    fn oversized_head_is_rejected() {
        let reader = Http11Reader::new(1024);
        let mut buf = buffer(b"GET / HTTP/1.1\r\n");
        buf.extend_from_slice(&[b'a'; 1100]);
        let err = reader.parse_head(&mut buf).unwrap_err();
        assert_eq!(err.status(), Some(HttpStatus::RequestHeaderFieldsTooLarge));
    }

    #[test]
    fn bad_request_lines() {
        let reader = Http11Reader::new(1024);
        assert!(matches!(reader.parse_preface("BREW /pot HTTP/1.1"), Err(RequestError::UnsupportedMethod(_))));
        assert!(matches!(reader.parse_preface("GET / HTTP/3"), Err(RequestError::UnsupportedVersion(_))));
        assert!(matches!(reader.parse_preface("GET /"), Err(RequestError::Malformed(_))));
        assert!(reader.parse_preface("OPTIONS * HTTP/1.0").is_ok());
    }

    #[test]
    fn content_length_body() {
        let reader = Http11Reader::new(1024);
        let headers: HashMap<String, String> = [("content-length".to_string(), "5".to_string())].into();
        let framing = reader.body_framing(&headers).unwrap();
        assert_eq!(framing, BodyFraming::ContentLength(5));

        let mut buf = buffer(b"hel");
        assert_eq!(reader.parse_body(framing, &mut buf).unwrap(), None);
        buf.extend_from_slice(b"loGET");
        assert_eq!(reader.parse_body(framing, &mut buf).unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(&buf[..], b"GET");
    }

    #[test]
    fn chunked_body_with_trailers() {
        let reader = Http11Reader::new(1024);
        let headers: HashMap<String, String> = [
            ("transfer-encoding".to_string(), "chunked".to_string()),
            ("content-length".to_string(), "99".to_string()),
        ].into();
        let framing = reader.body_framing(&headers).unwrap();
        assert_eq!(framing, BodyFraming::Chunked);

        let mut buf = buffer(b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n");
        assert_eq!(reader.parse_body(framing, &mut buf).unwrap(), None);

        buf.extend_from_slice(b"Expires: never\r\n\r\n");
        let body = reader.parse_body(framing, &mut buf).unwrap().unwrap();
        assert_eq!(&body[..], b"Wikipedia");
        assert!(buf.is_empty());

        let mut bad = buffer(b"zz\r\n");
        assert!(reader.parse_body(framing, &mut bad).is_err());
    }
}
