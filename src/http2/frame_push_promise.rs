use bytes::{BufMut, Bytes};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{flags, padded_length, put_padding, put_u31, read_u31, strip_padding, FrameHeader, FrameType};

//    +---------------+
//    |Pad Length? (8)|
//    +-+-------------+-----------------------------------------------+
//    |R|                  Promised Stream ID (31)                    |
//    +-+-----------------------------+-------------------------------+
//    |                   Header Block Fragment (*)                 ...
//    +---------------------------------------------------------------+
//    |                           Padding (*)                       ...
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    header: FrameHeader,
    promised_stream_id: u32,
    header_block_fragment: Bytes,
    padding_length: u8,
}

impl PushPromiseFrame {

    const PROMISED_STREAM_ID_LENGTH: u32 = 4;

    pub fn new(stream_id: u32,
               header_block_fragment: Bytes,
               promised_stream_id: u32,
               padding_length: u8,
               end_headers: bool,
               padded: bool,
               reserve_bit: bool) -> Self
    {
        let mut frame_flags = 0;
        if end_headers {
            frame_flags |= flags::END_HEADERS;
        }
        if padded {
            frame_flags |= flags::PADDED;
        }

        let padding_length = if padded { padding_length } else { 0 };
        let payload_length = Self::PROMISED_STREAM_ID_LENGTH
            + header_block_fragment.len() as u32
            + padded_length(padded, padding_length);

        PushPromiseFrame {
            header: FrameHeader::new(FrameType::PushPromise, frame_flags, stream_id, reserve_bit, payload_length),
            promised_stream_id,
            header_block_fragment,
            padding_length,
        }
    }

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        let (padding_length, mut content) = strip_padding(&header, payload);

        let mut promised_stream_id = 0;
        if content.len() >= Self::PROMISED_STREAM_ID_LENGTH as usize {
            promised_stream_id = read_u31(&mut content).1;
        } else {
            content = Bytes::new();
        }

        PushPromiseFrame {
            header,
            promised_stream_id,
            header_block_fragment: content,
            padding_length,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn promised_stream_id(&self) -> u32 {
        self.promised_stream_id
    }

    pub fn header_block_fragment(&self) -> &Bytes {
        &self.header_block_fragment
    }

    pub fn padding_length(&self) -> u8 {
        self.padding_length
    }

    pub fn flag_end_headers_set(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }

    pub fn flag_padded_set(&self) -> bool {
        self.header.has_flag(flags::PADDED)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        if self.flag_padded_set() {
            out.put_u8(self.padding_length);
        }
        put_u31(&mut out, false, self.promised_stream_id);
        out.extend_from_slice(&self.header_block_fragment);
        if self.flag_padded_set() {
            put_padding(&mut out, self.padding_length);
        }
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_non_zero_stream()?;

        //   PUSH_PROMISE MUST NOT be sent if the SETTINGS_ENABLE_PUSH setting of
        //   the peer endpoint is set to 0.  An endpoint that has set this setting
        //   and has received acknowledgement MUST treat the receipt of a
        //   PUSH_PROMISE frame as a connection error (Section 5.4.1) of type PROTOCOL_ERROR.
        if !settings.enable_push() {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason("PUSH_PROMISE while push is disabled"));
        }

        self.header.check_max_frame_size(settings)?;
        self.header.check_padding(Self::PROMISED_STREAM_ID_LENGTH, self.padding_length)?;

        if self.promised_stream_id == 0 {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason("promised stream id must not be 0"));
        }

        Ok(())
    }
}
