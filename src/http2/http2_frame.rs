use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};

//  All frames begin with a fixed 9-octet header followed by a variable-length payload.
//
//     +-----------------------------------------------+
//     |                 Length (24)                   |
//     +---------------+---------------+---------------+
//     |   Type (8)    |   Flags (8)   |
//     +-+-------------+---------------+-------------------------------+
//     |R|                 Stream Identifier (31)                      |
//     +=+=============================================================+
//     |                   Frame Payload (0...)                      ...
//     +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-4.1)
pub const FRAME_HEADER_LENGTH: usize = 9;

pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const MAX_ALLOWED_FRAME_SIZE: u32 = 0x00FF_FFFF;
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;

const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;
const RESERVE_BIT_MASK: u32 = 0x8000_0000;

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            other => FrameType::Unknown(other),
        }
    }
}

impl From<FrameType> for u8 {
    fn from(value: FrameType) -> Self {
        match value {
            FrameType::Data => 0x0,
            FrameType::Headers => 0x1,
            FrameType::Priority => 0x2,
            FrameType::RstStream => 0x3,
            FrameType::Settings => 0x4,
            FrameType::PushPromise => 0x5,
            FrameType::Ping => 0x6,
            FrameType::GoAway => 0x7,
            FrameType::WindowUpdate => 0x8,
            FrameType::Continuation => 0x9,
            FrameType::Unknown(other) => other,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SettingIdentifier {
    HeaderTableSize = 0x01,
    EnablePush = 0x02,
    MaxConcurrentStreams = 0x03,
    InitialWindowSize = 0x04,
    MaxFrameSize = 0x05,
    MaxHeaderListSize = 0x06,
}

impl SettingIdentifier {
    /// An endpoint that receives a SETTINGS frame with any unknown or
    /// unsupported identifier MUST ignore that setting.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x01 => Some(SettingIdentifier::HeaderTableSize),
            0x02 => Some(SettingIdentifier::EnablePush),
            0x03 => Some(SettingIdentifier::MaxConcurrentStreams),
            0x04 => Some(SettingIdentifier::InitialWindowSize),
            0x05 => Some(SettingIdentifier::MaxFrameSize),
            0x06 => Some(SettingIdentifier::MaxHeaderListSize),
            _ => None,
        }
    }
}

impl From<SettingIdentifier> for u16 {
    fn from(value: SettingIdentifier) -> Self {
        value as u16
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_length: u32,
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
    pub reserve_bit: bool,
}

impl FrameHeader {

    pub fn new(frame_type: FrameType, flags: u8, stream_id: u32, reserve_bit: bool, payload_length: u32) -> Self {
        FrameHeader {
            payload_length,
            frame_type,
            flags,
            stream_id: stream_id & STREAM_ID_MASK,
            reserve_bit,
        }
    }

    /// Reads the fixed header. Returns `None` until 9 bytes are available.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_LENGTH {
            return None;
        }

        let mut buf = &buf[..FRAME_HEADER_LENGTH];
        let payload_length = buf.get_uint(3) as u32;
        let frame_type = FrameType::from(buf.get_u8());
        let flags = buf.get_u8();
        let raw_stream_id = buf.get_u32();

        Some(FrameHeader {
            payload_length,
            frame_type,
            flags,
            stream_id: raw_stream_id & STREAM_ID_MASK,
            reserve_bit: raw_stream_id & RESERVE_BIT_MASK != 0,
        })
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        let mut sid = self.stream_id & STREAM_ID_MASK;
        if self.reserve_bit {
            sid |= RESERVE_BIT_MASK;
        }

        out.put_uint(u64::from(self.payload_length & MAX_ALLOWED_FRAME_SIZE), 3);
        out.put_u8(self.frame_type.into());
        out.put_u8(self.flags);
        out.put_u32(sid);
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag == flag
    }

    pub(crate) fn buffer_for_write(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(FRAME_HEADER_LENGTH + self.payload_length as usize);
        self.write_to(&mut out);
        out
    }

    pub(crate) fn require_stream_zero(&self) -> Result<(), Http2Error> {
        if self.stream_id != 0 {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason(format!("{:?} frame must be sent on stream 0", self.frame_type)));
        }
        Ok(())
    }

    pub(crate) fn require_non_zero_stream(&self) -> Result<(), Http2Error> {
        if self.stream_id == 0 {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason(format!("{:?} frame must not be sent on stream 0", self.frame_type)));
        }
        Ok(())
    }

    //   An endpoint MUST send an error code of FRAME_SIZE_ERROR if a frame
    //   exceeds the size defined in SETTINGS_MAX_FRAME_SIZE
    //   (https://datatracker.ietf.org/doc/html/rfc7540#section-4.2)
    pub(crate) fn check_max_frame_size(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        if self.payload_length > settings.max_frame_size() {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason(format!("payload of {} exceeds max frame size {}",
                                     self.payload_length, settings.max_frame_size())));
        }
        Ok(())
    }

    /// `fixed_length` counts the octets between the pad length field and the variable part.
    pub(crate) fn check_padding(&self, fixed_length: u32, padding_length: u8) -> Result<(), Http2Error> {
        let padded = self.has_flag(flags::PADDED);
        let overhead = fixed_length + if padded { 1 } else { 0 };

        if self.payload_length < overhead {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason(format!("{:?} frame too short", self.frame_type)));
        }

        //  If the length of the padding is the length of the
        //  frame payload or greater, the recipient MUST treat this as a
        //  connection error (Section 5.4.1) of type PROTOCOL_ERROR.
        if padded && u32::from(padding_length) > self.payload_length - overhead {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason("padding exceeds frame payload"));
        }

        Ok(())
    }
}


pub(crate) fn padded_length(padded: bool, padding_length: u8) -> u32 {
    if padded {
        1 + u32::from(padding_length)
    } else {
        0
    }
}

/// Splits a padded payload into its pad length and the bytes between the
/// pad length field and the padding. A malformed payload yields empty content,
/// the frame's `validate` reports it.
pub(crate) fn strip_padding(header: &FrameHeader, mut payload: Bytes) -> (u8, Bytes) {
    if !header.has_flag(flags::PADDED) {
        return (0, payload);
    }
    if payload.is_empty() {
        return (0, Bytes::new());
    }

    let padding_length = payload.get_u8();
    let pad = usize::from(padding_length);
    if pad > payload.len() {
        return (padding_length, Bytes::new());
    }

    let content_length = payload.len() - pad;
    (padding_length, payload.split_to(content_length))
}

pub(crate) fn put_padding(out: &mut BytesMut, padding_length: u8) {
    out.put_bytes(0, usize::from(padding_length));
}

/// Splits a 32-bit field into its leading bit and the 31-bit value.
pub(crate) fn read_u31(buf: &mut Bytes) -> (bool, u32) {
    let raw = buf.get_u32();
    (raw & RESERVE_BIT_MASK != 0, raw & STREAM_ID_MASK)
}

pub(crate) fn put_u31(out: &mut BytesMut, high_bit: bool, value: u32) {
    let mut raw = value & STREAM_ID_MASK;
    if high_bit {
        raw |= RESERVE_BIT_MASK;
    }
    out.put_u32(raw);
}


/// Header plus the unparsed payload, exactly as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl RawFrame {

    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        RawFrame { header, payload }
    }

    /// A raw frame has not been decoded into its typed fields yet.
    pub fn initialized(&self) -> bool {
        false
    }
}
