use bytes::{Buf, BufMut, Bytes};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{put_u31, read_u31, FrameHeader, FrameType};

//    +-+-------------------------------------------------------------+
//    |R|                  Last-Stream-ID (31)                        |
//    +-+-------------------------------------------------------------+
//    |                      Error Code (32)                          |
//    +---------------------------------------------------------------+
//    |                  Additional Debug Data (*)                    |
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    header: FrameHeader,
    last_stream_id: u32,
    error_code: u32,
    debug_data: Bytes,
}

impl GoAwayFrame {

    const FIXED_LENGTH: u32 = 8;

    pub fn new(stream_id: u32, debug_data: Bytes, error_code: ErrorCode, last_stream_id: u32, reserve_bit: bool) -> Self {
        let payload_length = Self::FIXED_LENGTH + debug_data.len() as u32;
        GoAwayFrame {
            header: FrameHeader::new(FrameType::GoAway, 0, stream_id, reserve_bit, payload_length),
            last_stream_id,
            error_code: error_code.into(),
            debug_data,
        }
    }

    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Self {
        if payload.len() < Self::FIXED_LENGTH as usize {
            return GoAwayFrame { header, last_stream_id: 0, error_code: 0, debug_data: Bytes::new() };
        }

        let (_, last_stream_id) = read_u31(&mut payload);
        let error_code = payload.get_u32();
        GoAwayFrame { header, last_stream_id, error_code, debug_data: payload }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn last_stream_id(&self) -> u32 {
        self.last_stream_id
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_u32(self.error_code)
    }

    pub fn debug_data(&self) -> &Bytes {
        &self.debug_data
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        put_u31(&mut out, false, self.last_stream_id);
        out.put_u32(self.error_code);
        out.extend_from_slice(&self.debug_data);
        out.freeze()
    }

    //   The GOAWAY frame applies to the connection, not a specific stream.
    //   An endpoint MUST treat a GOAWAY frame with a stream identifier other
    //   than 0x0 as a connection error (Section 5.4.1) of type PROTOCOL_ERROR.
    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_stream_zero()?;
        self.header.check_max_frame_size(settings)?;

        if self.header.payload_length < Self::FIXED_LENGTH {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("GOAWAY payload shorter than 8 octets"));
        }

        Ok(())
    }
}
