use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use anyhow::Result;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::codec::{Encoder, FramedRead};
use tracing::{debug, info, warn};
use crate::config::HttpChannelConfig;
use crate::dispatcher::Dispatcher;
use crate::http2::common_frame::Frame;
use crate::http2::frame_continuation::ContinuationFrame;
use crate::http2::frame_data::DataFrame;
use crate::http2::frame_goaway::GoAwayFrame;
use crate::http2::frame_headers::{HeadersFrame, HeadersFrameOptions};
use crate::http2::frame_rst_stream::RstStreamFrame;
use crate::http2::frame_settings::SettingsFrame;
use crate::http2::frame_window_update::WindowUpdateFrame;
use crate::http2::http2_codec::FrameCodec;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};
use crate::http2::http2_header_decoder::{Http2HeaderDecoder, Http2HeaderEncoder};
use crate::http2::http2_stream::{Http2Stream, StreamState};
use crate::http_object::{HttpRequest, HttpResponse};
use crate::http_type::HttpProtocol;

/// Server side of one HTTP/2 connection.
///
/// Frame handling is synchronous: `handle_frame` takes one inbound frame and
/// returns the frames to write back. `serve` drives it over a transport.
pub struct Http2Connection {
    config: Arc<HttpChannelConfig>,
    dispatcher: Arc<Dispatcher>,

    local_settings: ConnectionSettings,
    peer_settings: ConnectionSettings,

    streams: HashMap<u32, Http2Stream>,
    refused_streams: HashSet<u32>,
    pending_streams: VecDeque<u32>,
    highest_stream_id: u32,
    header_block_stream: Option<u32>,

    // Connection-level flow control.
    send_window: i64,
    receive_window: i64,
    initial_receive_window: i64,

    decoder: Http2HeaderDecoder<'static>,
    encoder: Http2HeaderEncoder<'static>,

    goaway_received: bool,
    goaway_sent: bool,
}

impl Http2Connection {

    pub fn new(config: Arc<HttpChannelConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        let local_settings = config.local_settings();
        let decoder = Http2HeaderDecoder::new(local_settings.header_table_size() as usize);
        Http2Connection {
            config,
            dispatcher,
            local_settings,
            peer_settings: ConnectionSettings::default(),
            streams: HashMap::new(),
            refused_streams: HashSet::new(),
            pending_streams: VecDeque::new(),
            highest_stream_id: 0,
            header_block_stream: None,
            send_window: i64::from(DEFAULT_WINDOW_SIZE),
            receive_window: i64::from(DEFAULT_WINDOW_SIZE),
            initial_receive_window: i64::from(DEFAULT_WINDOW_SIZE),
            decoder,
            encoder: Http2HeaderEncoder::default(),
            goaway_received: false,
            goaway_sent: false,
        }
    }

    pub fn local_settings(&self) -> &ConnectionSettings {
        &self.local_settings
    }

    pub fn peer_settings(&self) -> &ConnectionSettings {
        &self.peer_settings
    }

    pub fn highest_stream_id(&self) -> u32 {
        self.highest_stream_id
    }

    /// `None` once the stream is closed and forgotten, or was never opened.
    pub fn stream_state(&self, stream_id: u32) -> Option<StreamState> {
        self.streams.get(&stream_id).map(Http2Stream::state)
    }

    pub fn connection_send_window(&self) -> i64 {
        self.send_window
    }

    pub fn is_going_away(&self) -> bool {
        self.goaway_received || self.goaway_sent
    }

    fn active_streams(&self) -> usize {
        self.streams.values().filter(|s| s.is_active()).count()
    }

    /// After the peer's GOAWAY, the connection ends once in-flight streams are done.
    pub fn is_drained(&self) -> bool {
        self.goaway_received && self.active_streams() == 0 && self.pending_streams.is_empty()
    }

    //   The server connection preface consists of a potentially empty
    //   SETTINGS frame (Section 6.5) that MUST be the first frame the server
    //   sends in the HTTP/2 connection.
    pub fn start(&mut self) -> Vec<Frame> {
        let settings = SettingsFrame::new(0, self.local_settings.differences_from_default(), false);
        let mut frames: Vec<Frame> = vec![settings.into()];

        // The connection window can only be raised with WINDOW_UPDATE.
        let read_window = i64::from(self.config.h2_read_window_size());
        let default_window = i64::from(DEFAULT_WINDOW_SIZE);
        if read_window > default_window {
            frames.push(WindowUpdateFrame::new(0, (read_window - default_window) as u32, false).into());
        }
        self.receive_window = read_window;
        self.initial_receive_window = read_window;
        frames
    }

    /// Applies the settings carried by the `HTTP2-Settings` header of an h2c upgrade.
    pub fn apply_upgrade_settings(&mut self, frame: &SettingsFrame) -> Result<(), Http2Error> {
        frame.validate(&ConnectionSettings::default())?;
        self.peer_settings.apply(frame)
    }

    //   The HTTP/1.1 request that is sent prior to upgrade is assigned a
    //   stream identifier of 1 (see Section 5.1.1) with default priority
    //   values (Section 5.3.5).  Stream 1 is implicitly "half-closed" from
    //   the client toward the server (see Section 5.1), since the request is
    //   completed as an HTTP/1.1 request.
    pub fn open_upgraded_stream(&mut self, mut request: HttpRequest) -> Vec<Frame> {
        let mut out = Vec::new();
        self.highest_stream_id = 1;
        self.streams.insert(1, Http2Stream::upgraded(self.peer_settings.initial_window_size(),
                                                     self.local_settings.initial_window_size()));

        request.protocol = HttpProtocol::HTTP2;
        let response = self.dispatch_request(&mut request);
        if let Err(e) = self.queue_response(1, response, &mut out) {
            out.extend(self.reset_stream(&e));
        }
        out
    }

    /// Handles one inbound frame. Stream errors are answered with RST_STREAM
    /// in the returned frames; a connection error is returned and the caller
    /// must send GOAWAY.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<Vec<Frame>, Http2Error> {
        let mut out = Vec::new();
        match self.process_frame(frame, &mut out) {
            Ok(()) => Ok(out),
            Err(e) if e.is_connection_error() => Err(e),
            Err(e) => {
                warn!("{}", e);
                out.extend(self.reset_stream(&e));
                Ok(out)
            },
        }
    }

    fn process_frame(&mut self, frame: Frame, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        //   A receiver MUST treat the receipt of any other type of frame or a
        //   frame on a different stream as a connection error (Section 5.4.1)
        //   of type PROTOCOL_ERROR.
        if let Some(sid) = self.header_block_stream {
            let continues = matches!(frame, Frame::Continuation(_)) && frame.stream_id() == sid;
            if !continues {
                return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("header block on stream {} interrupted by {:?} on stream {}",
                                         sid, frame.frame_type(), frame.stream_id())));
            }
        }

        frame.validate(&self.local_settings)?;
        debug!("connection received {:?} frame on stream {} ({} octets).",
               frame.frame_type(), frame.stream_id(), frame.payload_length());

        match frame {
            Frame::Settings(f) => self.on_settings(&f, out),
            Frame::Ping(f) => {
                if !f.flag_ack_set() {
                    out.push(f.ack_for().into());
                }
                Ok(())
            },
            Frame::GoAway(f) => {
                info!("peer sent GOAWAY with {} and last stream {}.", f.error_code(), f.last_stream_id());
                self.goaway_received = true;
                Ok(())
            },
            Frame::WindowUpdate(f) => self.on_window_update(&f, out),
            //   Implementations MUST ignore and discard any frame that has a
            //   type that is unknown.
            Frame::Unknown(_) => Ok(()),
            other => self.on_stream_frame(other, out),
        }
    }

    fn on_settings(&mut self, frame: &SettingsFrame, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        if frame.flag_ack_set() {
            debug!("peer acknowledged SETTINGS.");
            return Ok(());
        }

        let old_window = i64::from(self.peer_settings.initial_window_size());
        self.peer_settings.apply(frame)?;

        //   When the value of SETTINGS_INITIAL_WINDOW_SIZE changes, a receiver
        //   MUST adjust the size of all stream flow-control windows that it
        //   maintains by the difference between the new value and the old value.
        let delta = i64::from(self.peer_settings.initial_window_size()) - old_window;
        if delta != 0 {
            for stream in self.streams.values_mut() {
                stream.increase_send_window(delta).map_err(|_| {
                    Http2Error::connection_error(ErrorCode::FlowControlError)
                        .with_reason("SETTINGS_INITIAL_WINDOW_SIZE overflows a stream window")
                })?;
            }
        }

        out.push(SettingsFrame::ack().into());
        self.flush_pending(out);
        Ok(())
    }

    fn on_window_update(&mut self, frame: &WindowUpdateFrame, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        let increment = i64::from(frame.window_size_increment());
        let sid = frame.header().stream_id;

        if sid == 0 {
            let next = self.send_window + increment;
            if next > i64::from(MAX_WINDOW_SIZE) {
                return Err(Http2Error::connection_error(ErrorCode::FlowControlError)
                    .with_reason("connection send window overflow"));
            }
            self.send_window = next;
        } else if let Some(stream) = self.streams.get_mut(&sid) {
            stream.increase_send_window(increment)?;
        } else if sid > self.highest_stream_id {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason(format!("WINDOW_UPDATE on idle stream {}", sid)));
        }
        // Closed streams may still see WINDOW_UPDATE.

        self.flush_pending(out);
        Ok(())
    }

    fn on_stream_frame(&mut self, frame: Frame, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        let sid = frame.stream_id();

        //   Streams initiated by a client MUST use odd-numbered stream identifiers
        if sid % 2 == 0 {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason(format!("{:?} on even stream {}", frame.frame_type(), sid)));
        }

        // DATA counts against the connection window even on closed streams.
        if let Frame::Data(data) = &frame {
            self.consume_connection_window(data.header().payload_length, out)?;
        }

        if !self.streams.contains_key(&sid) {
            if sid <= self.highest_stream_id {
                return Self::on_closed_stream_frame(&frame);
            }
            match &frame {
                Frame::Headers(_) => self.open_stream(sid),
                Frame::Priority(_) => return Ok(()),
                //   Receiving any frame other than HEADERS or PRIORITY on a stream
                //   in this state MUST be treated as a connection error
                //   (Section 5.4.1) of type PROTOCOL_ERROR.
                _ => {
                    return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                        .with_reason(format!("{:?} on idle stream {}", frame.frame_type(), sid)));
                },
            }
        }

        let limit_window_updates = self.config.h2_limit_window_update_frames();
        let Some(stream) = self.streams.get_mut(&sid) else {
            return Ok(());
        };

        stream.verify_read_frame_sequence(&frame)?;

        //   A server that receives a larger header block than it is willing
        //   to handle can send an HTTP 431 (Request Header Fields Too Large)
        //   status code [RFC6585].
        // The block is still compressed, so the connection is torn down
        // instead of answering on the stream.
        if let Some(fragment) = frame.header_block_fragment() {
            let limit = self.local_settings.max_header_list_size() as usize;
            if stream.header_block_len() + fragment.len() > limit {
                return Err(Http2Error::connection_error(ErrorCode::EnhanceYourCalm)
                    .with_reason(format!("header block on stream {} exceeds {} octets", sid, limit)));
            }
        }
        stream.apply_read(&frame);

        if let Frame::Data(data) = &frame {
            if let Some(increment) = stream.consume_receive_window(data.header().payload_length, !limit_window_updates)? {
                out.push(WindowUpdateFrame::new(sid, increment, false).into());
            }
        }

        let block_done = matches!(frame, Frame::Headers(_) | Frame::Continuation(_)) && !stream.continuation_expected();
        self.header_block_stream = if stream.continuation_expected() { Some(sid) } else { None };

        if block_done {
            let trailers = stream.has_headers();
            let block = stream.take_header_block();
            // Refused streams are still decoded to keep the HPACK context in sync.
            let headers = self.decoder.decode_headers(sid, block, trailers)?;
            if self.refused_streams.remove(&sid) {
                return Err(Http2Error::stream_error(sid, ErrorCode::RefusedStream)
                    .with_reason(format!("stream {} over the concurrent stream limit", sid)));
            }
            stream.set_headers(headers);
        }

        match &frame {
            Frame::RstStream(f) => {
                info!("stream {} reset by peer with {}.", sid, f.error_code());
                self.pending_streams.retain(|s| *s != sid);
            },
            _ if stream.request_complete() => {
                if let Some((headers, body)) = stream.take_request() {
                    self.dispatch(sid, headers, body, out)?;
                }
            },
            _ => {},
        }

        self.reap(sid);
        Ok(())
    }

    //   An endpoint that receives any frame other than PRIORITY after
    //   receiving a RST_STREAM MUST treat that as a stream error
    //   (Section 5.4.2) of type STREAM_CLOSED.
    fn on_closed_stream_frame(frame: &Frame) -> Result<(), Http2Error> {
        let sid = frame.stream_id();
        match frame {
            Frame::Priority(_) | Frame::RstStream(_) => Ok(()),
            Frame::Continuation(_) => Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason(format!("CONTINUATION on closed stream {}", sid))),
            _ => Err(Http2Error::stream_error(sid, ErrorCode::StreamClosed)
                .with_reason(format!("{:?} on closed stream {}", frame.frame_type(), sid))),
        }
    }

    fn open_stream(&mut self, sid: u32) {
        self.highest_stream_id = sid;

        let limit = self.local_settings.max_concurrent_streams() as usize;
        if self.goaway_sent || self.active_streams() >= limit {
            self.refused_streams.insert(sid);
        }

        self.streams.insert(sid, Http2Stream::new(sid,
                                                  self.peer_settings.initial_window_size(),
                                                  self.local_settings.initial_window_size()));
        debug!("stream {} opened, {} active.", sid, self.active_streams());
    }

    fn consume_connection_window(&mut self, length: u32, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        let length = i64::from(length);
        if length > self.receive_window {
            return Err(Http2Error::connection_error(ErrorCode::FlowControlError)
                .with_reason("peer overran connection receive window"));
        }
        self.receive_window -= length;

        let used = self.initial_receive_window - self.receive_window;
        let eager = !self.config.h2_limit_window_update_frames();
        if used > 0 && (eager || self.receive_window <= self.initial_receive_window / 2) {
            self.receive_window = self.initial_receive_window;
            out.push(WindowUpdateFrame::new(0, used as u32, false).into());
        }
        Ok(())
    }

    fn dispatch(&mut self, sid: u32, headers: Vec<(String, String)>, body: Bytes, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        let mut request = HttpRequest::from_h2_headers(headers, body)
            .map_err(|e| Http2Error::stream_error(sid, ErrorCode::ProtocolError).with_reason(format!("{:#}", e)))?;
        debug!("stream {} dispatches {} {}.", sid, request.method, request.path);

        let response = self.dispatch_request(&mut request);
        self.queue_response(sid, response, out)
    }

    fn dispatch_request(&self, request: &mut HttpRequest) -> HttpResponse {
        let response = self.dispatcher.dispatch(request);
        if request.take_upgrade_handler().is_some() {
            warn!("{} {} asked for an upgrade over HTTP/2, ignoring it.", request.method, request.path);
        }
        response
    }

    /// HEADERS (plus CONTINUATION) go out at once; DATA is queued behind the
    /// flow-control windows.
    fn queue_response(&mut self, sid: u32, response: HttpResponse, out: &mut Vec<Frame>) -> Result<(), Http2Error> {
        let max_frame_size = self.peer_settings.max_frame_size() as usize;
        let status = response.get_status_code();
        let body = match response.body() {
            Some(body) if status.allows_body() => body.clone(),
            _ => Bytes::new(),
        };

        let Some(stream) = self.streams.get_mut(&sid) else {
            return Ok(());
        };

        let block = self.encoder.encode_response(status.code(), response.headers());
        let end_stream = body.is_empty();
        for frame in header_block_frames(sid, block, end_stream, max_frame_size) {
            stream.verify_write_frame_sequence(&frame)?;
            stream.apply_write(&frame);
            out.push(frame);
        }

        if !end_stream {
            let mut remaining = body;
            while !remaining.is_empty() {
                let chunk = remaining.split_to(remaining.len().min(max_frame_size));
                stream.queue_data(DataFrame::new(sid, chunk, 0, remaining.is_empty(), false, false));
            }
            self.pending_streams.push_back(sid);
        }

        self.flush_pending(out);
        self.reap(sid);
        Ok(())
    }

    /// Sends queued DATA while both windows allow it, in stream order.
    fn flush_pending(&mut self, out: &mut Vec<Frame>) {
        let mut waiting = VecDeque::new();
        while let Some(sid) = self.pending_streams.pop_front() {
            let Some(stream) = self.streams.get_mut(&sid) else {
                continue;
            };

            while let Some(data) = stream.next_sendable(self.send_window) {
                let frame: Frame = data.into();
                self.send_window -= i64::from(frame.payload_length());
                stream.apply_write(&frame);
                out.push(frame);
            }

            if stream.has_pending_data() {
                waiting.push_back(sid);
            } else if stream.is_closed() {
                self.streams.remove(&sid);
            }
        }
        self.pending_streams = waiting;
    }

    fn reap(&mut self, sid: u32) {
        let done = self.streams.get(&sid).is_some_and(|s| s.is_closed() && !s.has_pending_data());
        if done {
            self.streams.remove(&sid);
            debug!("stream {} closed.", sid);
        }
    }

    fn reset_stream(&mut self, error: &Http2Error) -> Option<Frame> {
        let sid = error.stream_id()?;
        self.streams.remove(&sid);
        self.refused_streams.remove(&sid);
        self.pending_streams.retain(|s| *s != sid);
        if self.header_block_stream == Some(sid) {
            self.header_block_stream = None;
        }
        Some(RstStreamFrame::new(sid, error.code(), false).into())
    }

    pub fn go_away(&mut self, code: ErrorCode, reason: &str) -> Frame {
        self.goaway_sent = true;
        let debug_data = Bytes::copy_from_slice(reason.as_bytes());
        GoAwayFrame::new(0, debug_data, code, self.highest_stream_id, false).into()
    }

    /// Serves the connection until either side closes it. `read_ahead` holds
    /// bytes already read from `io`; `upgraded_request` is the HTTP/1.1
    /// request of an h2c upgrade, answered on stream 1.
    pub async fn serve<T>(mut self, io: T, read_ahead: BytesMut, upgraded_request: Option<HttpRequest>) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, writer) = tokio::io::split(io);
        let mut frames = FramedRead::new(reader, FrameCodec::with_preface(self.local_settings.max_frame_size()));
        frames.read_buffer_mut().extend_from_slice(&read_ahead);
        let mut writer = FrameWriter::new(writer);

        let mut outbound = self.start();
        if let Some(request) = upgraded_request {
            outbound.extend(self.open_upgraded_stream(request));
        }
        writer.send_all(outbound).await?;

        let idle_timeout = self.config.h2_connection_idle_timeout();
        loop {
            if self.is_drained() {
                info!("connection drained after GOAWAY.");
                break;
            }

            let next = match idle_timeout {
                Some(idle) => match timeout(idle, frames.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!("connection idle for {:?}, closing.", idle);
                        let goaway = self.go_away(ErrorCode::NoError, "idle timeout");
                        writer.send_all(vec![goaway]).await?;
                        break;
                    },
                },
                None => frames.next().await,
            };

            let frame = match next {
                None => {
                    info!("peer closed the connection.");
                    break;
                },
                Some(Ok(frame)) => frame,
                Some(Err(e)) => match e.downcast::<Http2Error>() {
                    Ok(error) => {
                        warn!("connection encounters error {}", error);
                        let goaway = self.go_away(error.code(), error.reason());
                        writer.send_all(vec![goaway]).await?;
                        break;
                    },
                    Err(e) => return Err(e),
                },
            };

            match self.handle_frame(frame) {
                Ok(outbound) => writer.send_all(outbound).await?,
                Err(error) => {
                    warn!("connection encounters error {}", error);
                    let goaway = self.go_away(error.code(), error.reason());
                    writer.send_all(vec![goaway]).await?;
                    self.linger(&mut frames).await;
                    break;
                },
            }
        }

        writer.shutdown().await;
        Ok(())
    }

    // Gives the peer the close timeout to read our GOAWAY and hang up.
    async fn linger<T: AsyncRead>(&self, frames: &mut FramedRead<ReadHalf<T>, FrameCodec>) {
        let close_timeout = self.config.h2_connection_close_timeout();
        let drained = timeout(close_timeout, async {
            while let Some(Ok(_)) = frames.next().await {}
        }).await;
        if drained.is_err() {
            debug!("peer kept the connection open for {:?} after GOAWAY.", close_timeout);
        }
    }
}

fn header_block_frames(sid: u32, mut block: Bytes, end_stream: bool, max_frame_size: usize) -> Vec<Frame> {
    let first = block.split_to(block.len().min(max_frame_size));
    let mut frames: Vec<Frame> = vec![HeadersFrame::new(sid, first, HeadersFrameOptions {
        end_stream,
        end_headers: block.is_empty(),
        ..Default::default()
    }).into()];

    while !block.is_empty() {
        let fragment = block.split_to(block.len().min(max_frame_size));
        frames.push(ContinuationFrame::new(sid, fragment, block.is_empty(), false).into());
    }
    frames
}


struct FrameWriter<T> {
    writer: BufWriter<WriteHalf<T>>,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<T: AsyncWrite> FrameWriter<T> {

    fn new(writer: WriteHalf<T>) -> Self {
        FrameWriter { writer: BufWriter::new(writer), codec: FrameCodec::default(), buf: BytesMut::new() }
    }

    async fn send_all(&mut self, frames: Vec<Frame>) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }
        for frame in frames {
            debug!("sending {:?} frame on stream {}.", frame.frame_type(), frame.stream_id());
            self.codec.encode(frame, &mut self.buf)?;
        }
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        self.buf.clear();
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("connection shutdown failed: {}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use fluke_hpack::Decoder;
    use crate::http2::frame_ping::PingFrame;
    use crate::http2::http2_conn_options::PartialConnectionSettings;
    use crate::http2::http2_frame::SettingIdentifier;
    use crate::http_status::HttpStatus;
    use crate::http_type::Method;

    fn hello(_req: &mut HttpRequest, mut res: HttpResponse) -> Result<HttpResponse> {
        res.set_body("hello world");
        Ok(res)
    }

    fn echo(req: &mut HttpRequest, mut res: HttpResponse) -> Result<HttpResponse> {
        res.set_body(req.body.clone().unwrap_or_default());
        Ok(res)
    }

    fn connection_with(config: HttpChannelConfig) -> Http2Connection {
        let mut dispatcher = Dispatcher::new();
        dispatcher.add(Method::GET, "/hello", hello).unwrap();
        dispatcher.add(Method::POST, "/echo", echo).unwrap();
        let mut conn = Http2Connection::new(Arc::new(config), Arc::new(dispatcher));
        conn.start();
        conn
    }

    fn connection() -> Http2Connection {
        connection_with(HttpChannelConfig::default())
    }

    fn request_block(method: &str, path: &str) -> Bytes {
        let mut encoder = fluke_hpack::Encoder::default();
        let fields = [(":method", method), (":scheme", "http"), (":path", path), (":authority", "localhost")];
        Bytes::from(encoder.encode(fields.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes()))))
    }

    fn get(sid: u32, path: &str) -> Frame {
        HeadersFrame::complete(sid, request_block("GET", path), true).into()
    }

    #[test]
    fn start_sends_settings_then_window_update() {
        let mut config = HttpChannelConfig::builder();
        config.h2_read_window_size(1_000_000);
        let mut conn = Http2Connection::new(Arc::new(config.build()), Arc::new(Dispatcher::new()));

        let frames = conn.start();
        let Frame::Settings(settings) = &frames[0] else { panic!("expected SETTINGS first") };
        assert_eq!(settings.enable_push(), Some(0));
        assert_eq!(settings.max_concurrent_streams(), Some(200));
        assert_eq!(settings.max_frame_size(), Some(57_344));

        let Frame::WindowUpdate(update) = &frames[1] else { panic!("expected WINDOW_UPDATE") };
        assert_eq!(update.header().stream_id, 0);
        assert_eq!(update.window_size_increment(), 1_000_000 - 65_535);
    }

    #[test]
    fn settings_and_ping_are_acknowledged() {
        let mut conn = connection();
        let peer = SettingsFrame::new(0, PartialConnectionSettings {
            initial_window_size: Some(1000),
            ..Default::default()
        }, false);

        let out = conn.handle_frame(peer.into()).unwrap();
        assert!(matches!(&out[..], [Frame::Settings(ack)] if ack.flag_ack_set()));
        assert_eq!(conn.peer_settings().initial_window_size(), 1000);

        let ping = PingFrame::new(0, Bytes::from_static(b"12345678"), false);
        let out = conn.handle_frame(ping.into()).unwrap();
        let [Frame::Ping(pong)] = &out[..] else { panic!("expected PING ack") };
        assert!(pong.flag_ack_set());
        assert_eq!(&pong.opaque_data()[..], b"12345678");

        // ACKs are not answered.
        assert!(conn.handle_frame(SettingsFrame::ack().into()).unwrap().is_empty());
    }

    #[test]
    fn get_request_is_answered_on_its_stream() {
        let mut conn = connection();
        let out = conn.handle_frame(get(1, "/hello")).unwrap();

        let [Frame::Headers(headers), Frame::Data(data)] = &out[..] else { panic!("expected HEADERS and DATA, got {:?}", out) };
        assert_eq!(headers.header().stream_id, 1);
        assert!(headers.flag_end_headers_set());
        assert!(!headers.flag_end_stream_set());

        let fields = Decoder::new().decode(headers.header_block_fragment()).unwrap();
        assert_eq!(fields[0], (b":status".to_vec(), b"200".to_vec()));

        assert_eq!(&data.data()[..], b"hello world");
        assert!(data.flag_end_stream_set());
        assert_eq!(conn.stream_state(1), None);
        assert_eq!(conn.highest_stream_id(), 1);
        assert_eq!(conn.connection_send_window(), 65_535 - 11);
    }

    #[test]
    fn unknown_route_is_404_without_body() {
        let mut conn = connection();
        let out = conn.handle_frame(get(1, "/missing")).unwrap();
        let [Frame::Headers(headers)] = &out[..] else { panic!("expected HEADERS only") };
        assert!(headers.flag_end_stream_set());
        let fields = Decoder::new().decode(headers.header_block_fragment()).unwrap();
        assert_eq!(fields[0].1, HttpStatus::NotFound.code().to_string().into_bytes());
    }

    #[test]
    fn request_body_arrives_in_data_frames() {
        let mut conn = connection();
        let open: Frame = HeadersFrame::complete(3, request_block("POST", "/echo"), false).into();
        assert!(conn.handle_frame(open).unwrap().is_empty());
        assert_eq!(conn.stream_state(3), Some(StreamState::Open));

        let part: Frame = DataFrame::new(3, Bytes::from_static(b"ping "), 0, false, false, false).into();
        let out = conn.handle_frame(part).unwrap();
        // Windows are reopened after every DATA frame by default.
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| matches!(f, Frame::WindowUpdate(u) if u.window_size_increment() == 5)));

        let last: Frame = DataFrame::new(3, Bytes::from_static(b"pong"), 2, true, true, false).into();
        let out = conn.handle_frame(last).unwrap();
        let data = out.iter().find_map(|f| match f { Frame::Data(d) => Some(d), _ => None }).unwrap();
        assert_eq!(&data.data()[..], b"ping pong");
    }

    #[test]
    fn even_stream_is_connection_error() {
        let mut conn = connection();
        let err = conn.handle_frame(get(2, "/hello")).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn data_on_idle_stream_is_connection_error() {
        let mut conn = connection();
        let data: Frame = DataFrame::new(5, Bytes::from_static(b"x"), 0, false, false, false).into();
        assert!(conn.handle_frame(data).unwrap_err().is_connection_error());
    }

    #[test]
    fn streams_over_the_limit_are_refused() {
        let mut config = HttpChannelConfig::builder();
        config.h2_max_concurrent_streams(1);
        let mut conn = connection_with(config.build());

        let open: Frame = HeadersFrame::complete(1, request_block("POST", "/echo"), false).into();
        conn.handle_frame(open).unwrap();

        let out = conn.handle_frame(get(3, "/hello")).unwrap();
        let [Frame::RstStream(rst)] = &out[..] else { panic!("expected RST_STREAM") };
        assert_eq!(rst.header().stream_id, 3);
        assert_eq!(rst.error_code(), ErrorCode::RefusedStream);

        // The HPACK context survived the refused block.
        let done: Frame = DataFrame::new(1, Bytes::from_static(b"ok"), 0, true, false, false).into();
        let out = conn.handle_frame(done).unwrap();
        assert!(out.iter().any(|f| matches!(f, Frame::Data(d) if &d.data()[..] == b"ok")));
    }

    #[test]
    fn data_is_split_to_the_peer_window() {
        let mut conn = connection();
        let peer = SettingsFrame::from_pairs(0, vec![(SettingIdentifier::InitialWindowSize.into(), 4)], false);
        conn.handle_frame(peer.into()).unwrap();

        let out = conn.handle_frame(get(1, "/hello")).unwrap();
        let [Frame::Headers(_), Frame::Data(first)] = &out[..] else { panic!("expected HEADERS and partial DATA") };
        assert_eq!(&first.data()[..], b"hell");
        assert!(!first.flag_end_stream_set());
        assert_eq!(conn.stream_state(1), Some(StreamState::HalfClosedRemote));

        // The connection window alone does not reopen the stream.
        let update: Frame = WindowUpdateFrame::new(0, 100, false).into();
        assert!(conn.handle_frame(update).unwrap().is_empty());

        let update: Frame = WindowUpdateFrame::new(1, 100, false).into();
        let out = conn.handle_frame(update).unwrap();
        let [Frame::Data(rest)] = &out[..] else { panic!("expected the rest of the DATA") };
        assert_eq!(&rest.data()[..], b"o world");
        assert!(rest.flag_end_stream_set());
        assert_eq!(conn.stream_state(1), None);
    }

    #[test]
    fn oversized_header_block_is_connection_error() {
        let mut builder = HttpChannelConfig::builder();
        builder.max_request_header_bytes(1024);
        let mut conn = connection_with(builder.build());
        assert_eq!(conn.local_settings().max_header_list_size(), 1024);

        let open: Frame = HeadersFrame::new(1, Bytes::from(vec![0x82; 600]), HeadersFrameOptions {
            end_stream: true,
            ..Default::default()
        }).into();
        assert!(conn.handle_frame(open).unwrap().is_empty());

        let flood: Frame = ContinuationFrame::new(1, Bytes::from(vec![0x82; 600]), false, false).into();
        let err = conn.handle_frame(flood).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::EnhanceYourCalm);
    }

    #[test]
    fn interrupted_header_block_is_connection_error() {
        let mut conn = connection();
        let open: Frame = HeadersFrame::new(1, request_block("GET", "/hello"), HeadersFrameOptions {
            end_stream: true,
            ..Default::default()
        }).into();
        assert!(conn.handle_frame(open).unwrap().is_empty());

        let err = conn.handle_frame(get(3, "/hello")).unwrap_err();
        assert!(err.is_connection_error());

        let goaway = conn.go_away(err.code(), err.reason());
        let Frame::GoAway(goaway) = goaway else { panic!("expected GOAWAY") };
        assert_eq!(goaway.last_stream_id(), 1);
        assert_eq!(goaway.error_code(), ErrorCode::ProtocolError);
        assert!(conn.is_going_away());
    }

    #[test]
    fn continuation_completes_header_block() {
        let mut conn = connection();
        let block = request_block("GET", "/hello");
        let (first, rest) = block.split_at(3);

        let open: Frame = HeadersFrame::new(1, Bytes::copy_from_slice(first), HeadersFrameOptions {
            end_stream: true,
            ..Default::default()
        }).into();
        conn.handle_frame(open).unwrap();

        let cont: Frame = ContinuationFrame::new(1, Bytes::copy_from_slice(rest), true, false).into();
        let out = conn.handle_frame(cont).unwrap();
        assert!(matches!(&out[..], [Frame::Headers(_), Frame::Data(_)]));
    }

    #[test]
    fn upgraded_stream_one_gets_the_response() {
        let mut conn = connection();
        let mut request = HttpRequest::default();
        request.path = "/hello".to_string();

        let out = conn.open_upgraded_stream(request);
        assert!(matches!(&out[..], [Frame::Headers(h), Frame::Data(_)] if h.header().stream_id == 1));
        assert_eq!(conn.highest_stream_id(), 1);

        // Stream 1 is taken, the client continues with 3.
        let data: Frame = DataFrame::new(1, Bytes::from_static(b"x"), 0, false, false, false).into();
        let out = conn.handle_frame(data).unwrap();
        assert!(out.iter().any(|f| matches!(f, Frame::RstStream(r) if r.error_code() == ErrorCode::StreamClosed)));
    }

    #[test]
    fn peer_goaway_drains_connection() {
        let mut conn = connection();
        let goaway: Frame = GoAwayFrame::new(0, Bytes::new(), ErrorCode::NoError, 0, false).into();
        conn.handle_frame(goaway).unwrap();
        assert!(conn.is_drained());
    }
}
