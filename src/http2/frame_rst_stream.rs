use bytes::{Buf, BufMut, Bytes};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{FrameHeader, FrameType};

//    +---------------------------------------------------------------+
//    |                        Error Code (32)                        |
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RstStreamFrame {
    header: FrameHeader,
    error_code: u32,
}

impl RstStreamFrame {

    const PAYLOAD_LENGTH: u32 = 4;

    pub fn new(stream_id: u32, error_code: ErrorCode, reserve_bit: bool) -> Self {
        RstStreamFrame {
            header: FrameHeader::new(FrameType::RstStream, 0, stream_id, reserve_bit, Self::PAYLOAD_LENGTH),
            error_code: error_code.into(),
        }
    }

    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Self {
        let error_code = if payload.len() >= 4 { payload.get_u32() } else { 0 };
        RstStreamFrame { header, error_code }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_u32(self.error_code)
    }

    pub fn raw_error_code(&self) -> u32 {
        self.error_code
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        out.put_u32(self.error_code);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_non_zero_stream()?;
        self.header.check_max_frame_size(settings)?;

        //   A RST_STREAM frame with a length other than 4 octets MUST be treated
        //   as a connection error (Section 5.4.1) of type FRAME_SIZE_ERROR.
        if self.header.payload_length != Self::PAYLOAD_LENGTH {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("RST_STREAM payload must be 4 octets"));
        }

        Ok(())
    }
}
