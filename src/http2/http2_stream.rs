use std::collections::VecDeque;
use bytes::{Bytes, BytesMut};
use tracing::debug;
use crate::http2::common_frame::Frame;
use crate::http2::frame_data::DataFrame;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::MAX_WINDOW_SIZE;

//                             +--------+
//                     send PP |        | recv PP
//                    ,--------|  idle  |--------.
//                   /         |        |         \
//                  v          +--------+          v
//           +----------+          |           +----------+
//           |          |          | send H /  |          |
//    ,------| reserved |          | recv H    | reserved |------.
//    |      | (local)  |          |           | (remote) |      |
//    |      +----------+          v           +----------+      |
//    |          |             +--------+             |          |
//    |          |     recv ES |        | send ES     |          |
//    |   send H |     ,-------|  open  |-------.     | recv H   |
//    |          |    /        |        |        \    |          |
//    |          v   v         +--------+         v   v          |
//    |      +----------+          |           +----------+      |
//    |      |   half   |          |           |   half   |      |
//    |      |  closed  |          | send R /  |  closed  |      |
//    |      | (remote) |          | recv R    | (local)  |      |
//    |      +----------+          |           +----------+      |
//    |           |                |                 |           |
//    |           | send ES /      |       recv ES / |           |
//    |           | send R /       v        send R / |           |
//    |           | recv R     +--------+   recv R   |           |
//    | send R /  `----------->|        |<-----------'  send R / |
//    | recv R                 | closed |               recv R   |
//    `----------------------->|        |<----------------------'
//                             +--------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

#[derive(Debug)]
pub struct Http2Stream {
    stream_id: u32,
    state: StreamState,

    send_window: i64,
    receive_window: i64,
    initial_receive_window: u32,

    // Inflight request
    header_block: BytesMut,
    continuation_expected: bool,
    headers: Option<Vec<(String, String)>>,
    body: BytesMut,
    dispatched: bool,

    // Because of window size.
    pending_data: VecDeque<DataFrame>,
}

impl Http2Stream {

    pub fn new(stream_id: u32, initial_send_window: u32, initial_receive_window: u32) -> Self {
        Http2Stream {
            stream_id,
            state: StreamState::Idle,
            send_window: i64::from(initial_send_window),
            receive_window: i64::from(initial_receive_window),
            initial_receive_window,
            header_block: BytesMut::new(),
            continuation_expected: false,
            headers: None,
            body: BytesMut::new(),
            dispatched: false,
            pending_data: VecDeque::new(),
        }
    }

    /// Stream 1 after an h2c upgrade: the request arrived over HTTP/1.1.
    pub fn upgraded(initial_send_window: u32, initial_receive_window: u32) -> Self {
        let mut stream = Http2Stream::new(1, initial_send_window, initial_receive_window);
        stream.state = StreamState::HalfClosedRemote;
        stream.dispatched = true;
        stream
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Counts toward SETTINGS_MAX_CONCURRENT_STREAMS.
    pub fn is_active(&self) -> bool {
        matches!(self.state, StreamState::Open | StreamState::HalfClosedLocal | StreamState::HalfClosedRemote)
    }

    pub fn continuation_expected(&self) -> bool {
        self.continuation_expected
    }

    pub fn verify_read_frame_sequence(&self, frame: &Frame) -> Result<(), Http2Error> {
        let sid = self.stream_id;
        match frame {
            Frame::Continuation(_) if !self.continuation_expected => {
                Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("unexpected CONTINUATION on stream {}", sid)))
            },
            Frame::Continuation(_) => Ok(()),

            _ if self.continuation_expected => {
                Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("header block on stream {} interrupted", sid)))
            },

            Frame::Data(_) => match self.state {
                StreamState::Open | StreamState::HalfClosedLocal => Ok(()),
                //   If a DATA frame is received whose stream is not in "open" or
                //   "half-closed (local)" state, the recipient MUST respond with a
                //   stream error (Section 5.4.2) of type STREAM_CLOSED.
                _ => Err(Http2Error::stream_error(sid, ErrorCode::StreamClosed)
                    .with_reason(format!("DATA in state {:?}", self.state))),
            },

            Frame::Headers(_) => match self.state {
                StreamState::Idle
                | StreamState::ReservedRemote
                | StreamState::Open
                | StreamState::HalfClosedLocal => Ok(()),
                StreamState::ReservedLocal => Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("HEADERS on reserved (local) stream {}", sid))),
                _ => Err(Http2Error::stream_error(sid, ErrorCode::StreamClosed)
                    .with_reason(format!("HEADERS in state {:?}", self.state))),
            },

            // A client cannot push.
            Frame::PushPromise(_) => Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason("PUSH_PROMISE received by server")),

            //   RST_STREAM frames MUST NOT be sent for a stream in the "idle" state.
            //   If a RST_STREAM frame identifying an idle stream is received, the
            //   recipient MUST treat this as a connection error (Section 5.4.1) of
            //   type PROTOCOL_ERROR.
            Frame::RstStream(_) | Frame::WindowUpdate(_) if self.state == StreamState::Idle => {
                Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("{:?} on idle stream {}", frame.frame_type(), sid)))
            },

            _ => Ok(()),
        }
    }

    /// Moves the stream after a received frame passed `verify_read_frame_sequence`.
    pub fn apply_read(&mut self, frame: &Frame) {
        let before = self.state;
        match frame {
            Frame::Headers(f) => {
                self.state = match self.state {
                    StreamState::Idle => StreamState::Open,
                    StreamState::ReservedRemote => StreamState::HalfClosedLocal,
                    other => other,
                };
                self.continuation_expected = !f.flag_end_headers_set();
                self.header_block.extend_from_slice(f.header_block_fragment());
                if f.flag_end_stream_set() {
                    self.close_remote();
                }
            },
            Frame::Continuation(f) => {
                self.continuation_expected = !f.flag_end_headers_set();
                self.header_block.extend_from_slice(f.header_block_fragment());
            },
            Frame::Data(f) => {
                self.body.extend_from_slice(f.data());
                if f.flag_end_stream_set() {
                    self.close_remote();
                }
            },
            Frame::RstStream(_) => {
                self.state = StreamState::Closed;
                self.pending_data.clear();
            },
            _ => {},
        }

        if before != self.state {
            debug!("stream {} moved from {:?} to {:?} on read.", self.stream_id, before, self.state);
        }
    }

    pub fn verify_write_frame_sequence(&self, frame: &Frame) -> Result<(), Http2Error> {
        let sid = self.stream_id;
        let allowed = match frame {
            Frame::Headers(_) => matches!(self.state,
                StreamState::Idle | StreamState::ReservedLocal | StreamState::Open | StreamState::HalfClosedRemote),
            Frame::Data(_) => matches!(self.state, StreamState::Open | StreamState::HalfClosedRemote),
            Frame::RstStream(_) => self.state != StreamState::Idle,
            Frame::PushPromise(_) => matches!(self.state, StreamState::Open | StreamState::HalfClosedRemote),
            _ => true,
        };

        if !allowed {
            return Err(Http2Error::stream_error(sid, ErrorCode::InternalError)
                .with_reason(format!("cannot send {:?} in state {:?}", frame.frame_type(), self.state)));
        }
        Ok(())
    }

    pub fn apply_write(&mut self, frame: &Frame) {
        let before = self.state;
        match frame {
            Frame::Headers(f) => {
                self.state = match self.state {
                    StreamState::Idle => StreamState::Open,
                    StreamState::ReservedLocal => StreamState::HalfClosedRemote,
                    other => other,
                };
                if f.flag_end_stream_set() {
                    self.close_local();
                }
            },
            Frame::Data(f) => {
                self.send_window -= i64::from(f.header().payload_length);
                if f.flag_end_stream_set() {
                    self.close_local();
                }
            },
            Frame::RstStream(_) => {
                self.state = StreamState::Closed;
                self.pending_data.clear();
            },
            _ => {},
        }

        if before != self.state {
            debug!("stream {} moved from {:?} to {:?} on write.", self.stream_id, before, self.state);
        }
    }

    fn close_remote(&mut self) {
        self.state = match self.state {
            StreamState::Idle | StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            other => other,
        };
    }

    fn close_local(&mut self) {
        self.state = match self.state {
            StreamState::Idle | StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            other => other,
        };
    }

    pub fn send_window(&self) -> i64 {
        self.send_window
    }

    //   A sender MUST NOT allow a flow-control window to exceed 2^31-1
    //   octets.  If a sender receives a WINDOW_UPDATE that causes a flow-
    //   control window to exceed this maximum, it MUST terminate either the
    //   stream or the connection, as appropriate.
    pub fn increase_send_window(&mut self, increment: i64) -> Result<(), Http2Error> {
        let next = self.send_window + increment;
        if next > i64::from(MAX_WINDOW_SIZE) {
            return Err(Http2Error::stream_error(self.stream_id, ErrorCode::FlowControlError)
                .with_reason("stream send window overflow"));
        }
        self.send_window = next;
        Ok(())
    }

    /// Returns the WINDOW_UPDATE increment to send. Unless `eager`, the window
    /// is only reopened once half of it is used.
    pub fn consume_receive_window(&mut self, length: u32, eager: bool) -> Result<Option<u32>, Http2Error> {
        let length = i64::from(length);
        if length > self.receive_window {
            return Err(Http2Error::stream_error(self.stream_id, ErrorCode::FlowControlError)
                .with_reason("peer overran stream receive window"));
        }
        self.receive_window -= length;

        // No reason to open the window of a stream the peer already finished.
        if matches!(self.state, StreamState::HalfClosedRemote | StreamState::Closed) {
            return Ok(None);
        }

        let initial = i64::from(self.initial_receive_window);
        let used = initial - self.receive_window;
        if used > 0 && (eager || self.receive_window <= initial / 2) {
            self.receive_window = initial;
            return Ok(Some(used as u32));
        }
        Ok(None)
    }

    pub fn request_complete(&self) -> bool {
        !self.dispatched
            && !self.continuation_expected
            && matches!(self.state, StreamState::HalfClosedRemote | StreamState::Closed)
    }

    pub fn take_header_block(&mut self) -> Bytes {
        self.header_block.split().freeze()
    }

    pub fn set_headers(&mut self, headers: Vec<(String, String)>) {
        match &mut self.headers {
            // Trailers are appended to the request headers.
            Some(existing) => existing.extend(headers),
            None => self.headers = Some(headers),
        }
    }

    pub fn has_headers(&self) -> bool {
        self.headers.is_some()
    }

    pub fn take_request(&mut self) -> Option<(Vec<(String, String)>, Bytes)> {
        let headers = self.headers.take()?;
        self.dispatched = true;
        Some((headers, self.body.split().freeze()))
    }

    pub fn queue_data(&mut self, frame: DataFrame) {
        self.pending_data.push_back(frame);
    }

    pub fn has_pending_data(&self) -> bool {
        !self.pending_data.is_empty()
    }

    /// Pops the next queued DATA frame, cut down to what both windows allow.
    /// END_STREAM stays on the remainder until its last octet is sent.
    pub fn next_sendable(&mut self, connection_window: i64) -> Option<DataFrame> {
        let length = i64::from(self.pending_data.front()?.header().payload_length);
        let allowed = self.send_window.min(connection_window);
        if length <= allowed || length == 0 {
            return self.pending_data.pop_front();
        }
        if allowed <= 0 {
            return None;
        }

        let front = self.pending_data.pop_front()?;
        let mut rest = front.data().clone();
        let head = rest.split_to(allowed as usize);
        self.pending_data.push_front(DataFrame::new(self.stream_id, rest, 0, front.flag_end_stream_set(), false, false));
        Some(DataFrame::new(self.stream_id, head, 0, false, false, false))
    }

    pub fn header_block_len(&self) -> usize {
        self.header_block.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::http2::frame_headers::HeadersFrame;
    use crate::http2::frame_rst_stream::RstStreamFrame;
    use crate::http2::frame_window_update::WindowUpdateFrame;
    use crate::http2::frame_continuation::ContinuationFrame;

    fn headers(sid: u32, end_stream: bool) -> Frame {
        HeadersFrame::complete(sid, Bytes::from_static(&[0x82]), end_stream).into()
    }

    fn data(sid: u32, end_stream: bool) -> Frame {
        DataFrame::new(sid, Bytes::from_static(b"abc"), 0, end_stream, false, false).into()
    }

    #[test]
    fn request_then_response_closes_stream() {
        let mut stream = Http2Stream::new(1, 65_535, 65_535);

        stream.verify_read_frame_sequence(&headers(1, false)).unwrap();
        stream.apply_read(&headers(1, false));
        assert_eq!(stream.state(), StreamState::Open);

        stream.verify_read_frame_sequence(&data(1, true)).unwrap();
        stream.apply_read(&data(1, true));
        assert_eq!(stream.state(), StreamState::HalfClosedRemote);
        assert!(stream.request_complete());

        stream.verify_write_frame_sequence(&headers(1, false)).unwrap();
        stream.apply_write(&headers(1, false));
        stream.apply_write(&data(1, true));
        assert!(stream.is_closed());
        assert_eq!(stream.send_window(), 65_535 - 3);
    }

    #[test]
    fn data_on_idle_stream_is_stream_closed() {
        let stream = Http2Stream::new(3, 65_535, 65_535);
        let err = stream.verify_read_frame_sequence(&data(3, false)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StreamClosed);
        assert_eq!(err.stream_id(), Some(3));
    }

    #[test]
    fn rst_stream_and_window_update_on_idle_are_connection_errors() {
        let stream = Http2Stream::new(5, 65_535, 65_535);
        let rst: Frame = RstStreamFrame::new(5, ErrorCode::Cancel, false).into();
        assert!(stream.verify_read_frame_sequence(&rst).unwrap_err().is_connection_error());

        let wu: Frame = WindowUpdateFrame::new(5, 10, false).into();
        assert!(stream.verify_read_frame_sequence(&wu).unwrap_err().is_connection_error());
    }

    #[test]
    fn header_block_must_not_be_interrupted() {
        let mut stream = Http2Stream::new(1, 65_535, 65_535);
        let open: Frame = HeadersFrame::new(1, Bytes::from_static(&[0x82]), Default::default()).into();
        stream.apply_read(&open);
        assert!(stream.continuation_expected());

        let err = stream.verify_read_frame_sequence(&data(1, false)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);

        let cont: Frame = ContinuationFrame::new(1, Bytes::from_static(&[0x84]), true, false).into();
        stream.verify_read_frame_sequence(&cont).unwrap();
        stream.apply_read(&cont);
        assert!(!stream.continuation_expected());
        assert_eq!(&stream.take_header_block()[..], &[0x82, 0x84]);
    }

    #[test]
    fn send_window_overflow_is_flow_control_error() {
        let mut stream = Http2Stream::new(1, MAX_WINDOW_SIZE, 65_535);
        let err = stream.increase_send_window(1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FlowControlError);
    }

    #[test]
    fn queued_data_is_split_to_the_window() {
        let mut stream = Http2Stream::new(1, 4, 65_535);
        stream.apply_read(&headers(1, true));
        stream.apply_write(&headers(1, false));
        stream.queue_data(DataFrame::new(1, Bytes::from_static(b"hello world"), 0, true, false, false));

        let first = stream.next_sendable(100).unwrap();
        assert_eq!(&first.data()[..], b"hell");
        assert!(!first.flag_end_stream_set());
        stream.apply_write(&first.into());
        assert_eq!(stream.send_window(), 0);
        assert!(stream.next_sendable(100).is_none());

        stream.increase_send_window(100).unwrap();
        let second = stream.next_sendable(3).unwrap();
        assert_eq!(&second.data()[..], b"o w");
        assert!(!second.flag_end_stream_set());
        stream.apply_write(&second.into());

        let last = stream.next_sendable(100).unwrap();
        assert_eq!(&last.data()[..], b"orld");
        assert!(last.flag_end_stream_set());
        stream.apply_write(&last.into());
        assert!(stream.is_closed());
        assert!(!stream.has_pending_data());
    }

    #[test]
    fn receive_window_is_replenished_at_half() {
        let mut stream = Http2Stream::new(1, 65_535, 100);
        stream.apply_read(&headers(1, false));
        assert_eq!(stream.consume_receive_window(40, false).unwrap(), None);
        assert_eq!(stream.consume_receive_window(20, false).unwrap(), Some(60));
        assert_eq!(stream.consume_receive_window(5, true).unwrap(), Some(5));
        assert!(stream.consume_receive_window(101, false).is_err());
    }
}
