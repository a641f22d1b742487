#![allow(dead_code)]
//! Shared integration test utilities.

use std::sync::{Arc, Once};
use std::time::Duration;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing_subscriber::EnvFilter;
use h2_channel::dispatcher::Dispatcher;
use h2_channel::http2::common_frame::Frame;
use h2_channel::http2::http2_codec::FrameCodec;
use h2_channel::http2::http2_frame::MAX_ALLOWED_FRAME_SIZE;
use h2_channel::http_object::{HttpRequest, HttpResponse};
use h2_channel::http_type::Method;

static INIT_LOGGING: Once = Once::new();

const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    });
}

fn hello(_req: &mut HttpRequest, mut res: HttpResponse) -> anyhow::Result<HttpResponse> {
    res.set_body("hello world");
    Ok(res)
}

fn echo(req: &mut HttpRequest, mut res: HttpResponse) -> anyhow::Result<HttpResponse> {
    res.set_body(req.body.clone().unwrap_or_default());
    Ok(res)
}

pub fn test_dispatcher() -> Arc<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add(Method::GET, "/hello", hello).unwrap();
    dispatcher.add(Method::POST, "/echo", echo).unwrap();
    Arc::new(dispatcher)
}

pub fn client_codec() -> FrameCodec {
    FrameCodec::new(MAX_ALLOWED_FRAME_SIZE)
}

/// Reads until `codec` yields a frame.
pub async fn next_frame<R: AsyncRead + Unpin>(io: &mut R, buf: &mut BytesMut, codec: &mut FrameCodec) -> Frame {
    timeout(IO_TIMEOUT, async {
        loop {
            if let Some(frame) = codec.decode(buf).expect("server sent an invalid frame") {
                return frame;
            }
            let n = io.read_buf(buf).await.expect("read failed");
            assert!(n > 0, "connection closed while waiting for a frame");
        }
    }).await.expect("timed out waiting for a frame")
}

/// Reads until the buffer holds a full HTTP/1.1 response head; returns it and
/// leaves anything after it in `buf`.
pub async fn read_http1_head<R: AsyncRead + Unpin>(io: &mut R, buf: &mut BytesMut) -> String {
    timeout(IO_TIMEOUT, async {
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = buf.split_to(end + 4);
                return String::from_utf8(head.to_vec()).expect("head is utf-8");
            }
            let n = io.read_buf(buf).await.expect("read failed");
            assert!(n > 0, "connection closed while waiting for a response head");
        }
    }).await.expect("timed out waiting for a response head")
}

pub async fn read_to_end<R: AsyncRead + Unpin>(io: &mut R) -> String {
    let mut out = Vec::new();
    timeout(IO_TIMEOUT, io.read_to_end(&mut out)).await
        .expect("timed out waiting for close")
        .expect("read failed");
    String::from_utf8(out).expect("response is utf-8")
}
