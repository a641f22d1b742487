use bytes::Bytes;
use crate::http2::frame_continuation::ContinuationFrame;
use crate::http2::frame_data::DataFrame;
use crate::http2::frame_goaway::GoAwayFrame;
use crate::http2::frame_headers::HeadersFrame;
use crate::http2::frame_ping::PingFrame;
use crate::http2::frame_priority::PriorityFrame;
use crate::http2::frame_push_promise::PushPromiseFrame;
use crate::http2::frame_rst_stream::RstStreamFrame;
use crate::http2::frame_settings::SettingsFrame;
use crate::http2::frame_unknown::UnknownFrame;
use crate::http2::frame_window_update::WindowUpdateFrame;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::Http2Error;
use crate::http2::http2_frame::{FrameHeader, FrameType, RawFrame, FRAME_HEADER_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(UnknownFrame),
}

impl Frame {

    pub fn decode(raw: RawFrame) -> Frame {
        let RawFrame { header, payload } = raw;
        match header.frame_type {
            FrameType::Data => Frame::Data(DataFrame::decode(header, payload)),
            FrameType::Headers => Frame::Headers(HeadersFrame::decode(header, payload)),
            FrameType::Priority => Frame::Priority(PriorityFrame::decode(header, payload)),
            FrameType::RstStream => Frame::RstStream(RstStreamFrame::decode(header, payload)),
            FrameType::Settings => Frame::Settings(SettingsFrame::decode(header, payload)),
            FrameType::PushPromise => Frame::PushPromise(PushPromiseFrame::decode(header, payload)),
            FrameType::Ping => Frame::Ping(PingFrame::decode(header, payload)),
            FrameType::GoAway => Frame::GoAway(GoAwayFrame::decode(header, payload)),
            FrameType::WindowUpdate => Frame::WindowUpdate(WindowUpdateFrame::decode(header, payload)),
            FrameType::Continuation => Frame::Continuation(ContinuationFrame::decode(header, payload)),
            FrameType::Unknown(_) => Frame::Unknown(UnknownFrame::decode(header, payload)),
        }
    }

    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Data(f) => f.header(),
            Frame::Headers(f) => f.header(),
            Frame::Priority(f) => f.header(),
            Frame::RstStream(f) => f.header(),
            Frame::Settings(f) => f.header(),
            Frame::PushPromise(f) => f.header(),
            Frame::Ping(f) => f.header(),
            Frame::GoAway(f) => f.header(),
            Frame::WindowUpdate(f) => f.header(),
            Frame::Continuation(f) => f.header(),
            Frame::Unknown(f) => f.header(),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.header().stream_id
    }

    pub fn payload_length(&self) -> u32 {
        self.header().payload_length
    }

    pub fn frame_type(&self) -> FrameType {
        self.header().frame_type
    }

    pub fn reserve_bit(&self) -> bool {
        self.header().reserve_bit
    }

    pub fn wire_length(&self) -> usize {
        FRAME_HEADER_LENGTH + self.payload_length() as usize
    }

    /// Every constructed or decoded frame carries all of its typed fields.
    pub fn initialized(&self) -> bool {
        true
    }

    pub fn flag_end_stream_set(&self) -> bool {
        match self {
            Frame::Data(f) => f.flag_end_stream_set(),
            Frame::Headers(f) => f.flag_end_stream_set(),
            _ => false,
        }
    }

    pub fn flag_end_headers_set(&self) -> bool {
        match self {
            Frame::Headers(f) => f.flag_end_headers_set(),
            Frame::PushPromise(f) => f.flag_end_headers_set(),
            Frame::Continuation(f) => f.flag_end_headers_set(),
            _ => false,
        }
    }

    pub fn flag_padded_set(&self) -> bool {
        match self {
            Frame::Data(f) => f.flag_padded_set(),
            Frame::Headers(f) => f.flag_padded_set(),
            Frame::PushPromise(f) => f.flag_padded_set(),
            _ => false,
        }
    }

    pub fn flag_ack_set(&self) -> bool {
        match self {
            Frame::Settings(f) => f.flag_ack_set(),
            Frame::Ping(f) => f.flag_ack_set(),
            _ => false,
        }
    }

    pub fn flag_priority_set(&self) -> bool {
        match self {
            Frame::Headers(f) => f.flag_priority_set(),
            _ => false,
        }
    }

    /// Header block bytes carried by HEADERS, PUSH_PROMISE and CONTINUATION.
    pub fn header_block_fragment(&self) -> Option<&Bytes> {
        match self {
            Frame::Headers(f) => Some(f.header_block_fragment()),
            Frame::PushPromise(f) => Some(f.header_block_fragment()),
            Frame::Continuation(f) => Some(f.header_block_fragment()),
            _ => None,
        }
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        match self {
            Frame::Data(f) => f.build_frame_for_write(),
            Frame::Headers(f) => f.build_frame_for_write(),
            Frame::Priority(f) => f.build_frame_for_write(),
            Frame::RstStream(f) => f.build_frame_for_write(),
            Frame::Settings(f) => f.build_frame_for_write(),
            Frame::PushPromise(f) => f.build_frame_for_write(),
            Frame::Ping(f) => f.build_frame_for_write(),
            Frame::GoAway(f) => f.build_frame_for_write(),
            Frame::WindowUpdate(f) => f.build_frame_for_write(),
            Frame::Continuation(f) => f.build_frame_for_write(),
            Frame::Unknown(f) => f.build_frame_for_write(),
        }
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        match self {
            Frame::Data(f) => f.validate(settings),
            Frame::Headers(f) => f.validate(settings),
            Frame::Priority(f) => f.validate(settings),
            Frame::RstStream(f) => f.validate(settings),
            Frame::Settings(f) => f.validate(settings),
            Frame::PushPromise(f) => f.validate(settings),
            Frame::Ping(f) => f.validate(settings),
            Frame::GoAway(f) => f.validate(settings),
            Frame::WindowUpdate(f) => f.validate(settings),
            Frame::Continuation(f) => f.validate(settings),
            Frame::Unknown(f) => f.validate(settings),
        }
    }
}

impl From<DataFrame> for Frame {
    fn from(f: DataFrame) -> Self {
        Frame::Data(f)
    }
}

impl From<HeadersFrame> for Frame {
    fn from(f: HeadersFrame) -> Self {
        Frame::Headers(f)
    }
}

impl From<PriorityFrame> for Frame {
    fn from(f: PriorityFrame) -> Self {
        Frame::Priority(f)
    }
}

impl From<RstStreamFrame> for Frame {
    fn from(f: RstStreamFrame) -> Self {
        Frame::RstStream(f)
    }
}

impl From<SettingsFrame> for Frame {
    fn from(f: SettingsFrame) -> Self {
        Frame::Settings(f)
    }
}

impl From<PushPromiseFrame> for Frame {
    fn from(f: PushPromiseFrame) -> Self {
        Frame::PushPromise(f)
    }
}

impl From<PingFrame> for Frame {
    fn from(f: PingFrame) -> Self {
        Frame::Ping(f)
    }
}

impl From<GoAwayFrame> for Frame {
    fn from(f: GoAwayFrame) -> Self {
        Frame::GoAway(f)
    }
}

impl From<WindowUpdateFrame> for Frame {
    fn from(f: WindowUpdateFrame) -> Self {
        Frame::WindowUpdate(f)
    }
}

impl From<ContinuationFrame> for Frame {
    fn from(f: ContinuationFrame) -> Self {
        Frame::Continuation(f)
    }
}
