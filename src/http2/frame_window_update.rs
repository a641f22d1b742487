use bytes::Bytes;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{put_u31, read_u31, FrameHeader, FrameType};

//    +-+-------------------------------------------------------------+
//    |R|              Window Size Increment (31)                     |
//    +-+-------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.9)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    header: FrameHeader,
    window_size_increment: u32,
}

impl WindowUpdateFrame {

    const PAYLOAD_LENGTH: u32 = 4;

    pub fn new(stream_id: u32, window_size_increment: u32, reserve_bit: bool) -> Self {
        WindowUpdateFrame {
            header: FrameHeader::new(FrameType::WindowUpdate, 0, stream_id, reserve_bit, Self::PAYLOAD_LENGTH),
            window_size_increment,
        }
    }

    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Self {
        let window_size_increment = if payload.len() >= 4 { read_u31(&mut payload).1 } else { 0 };
        WindowUpdateFrame { header, window_size_increment }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn window_size_increment(&self) -> u32 {
        self.window_size_increment
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        put_u31(&mut out, false, self.window_size_increment);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.check_max_frame_size(settings)?;

        //   A WINDOW_UPDATE frame with a length other than 4 octets MUST be
        //   treated as a connection error (Section 5.4.1) of type FRAME_SIZE_ERROR.
        if self.header.payload_length != Self::PAYLOAD_LENGTH {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("WINDOW_UPDATE payload must be 4 octets"));
        }

        //   A receiver MUST treat the receipt of a WINDOW_UPDATE frame with an
        //   flow-control window increment of 0 as a stream error (Section 5.4.2)
        //   of type PROTOCOL_ERROR; errors on the connection flow-control window
        //   MUST be treated as a connection error (Section 5.4.1).
        if self.window_size_increment == 0 {
            let err = match self.header.stream_id {
                0 => Http2Error::connection_error(ErrorCode::ProtocolError),
                sid => Http2Error::stream_error(sid, ErrorCode::ProtocolError),
            };
            return Err(err.with_reason("window size increment of 0"));
        }

        Ok(())
    }
}
