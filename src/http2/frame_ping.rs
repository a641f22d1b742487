use bytes::Bytes;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{flags, FrameHeader, FrameType};

//    +---------------------------------------------------------------+
//    |                                                               |
//    |                      Opaque Data (64)                         |
//    |                                                               |
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingFrame {
    header: FrameHeader,
    opaque_data: Bytes,
}

impl PingFrame {

    const PAYLOAD_LENGTH: u32 = 8;

    pub fn new(stream_id: u32, opaque_data: Bytes, reserve_bit: bool) -> Self {
        let payload_length = opaque_data.len() as u32;
        PingFrame {
            header: FrameHeader::new(FrameType::Ping, 0, stream_id, reserve_bit, payload_length),
            opaque_data,
        }
    }

    //   Receivers of a PING frame that does not include an ACK flag MUST send
    //   a PING frame with the ACK flag set in response, with an identical payload.
    pub fn ack_for(&self) -> Self {
        let mut frame = PingFrame::new(0, self.opaque_data.clone(), false);
        frame.set_ack_flag();
        frame
    }

    pub fn set_ack_flag(&mut self) {
        self.header.flags |= flags::ACK;
    }

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        PingFrame { header, opaque_data: payload }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn opaque_data(&self) -> &Bytes {
        &self.opaque_data
    }

    pub fn flag_ack_set(&self) -> bool {
        self.header.has_flag(flags::ACK)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        out.extend_from_slice(&self.opaque_data);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_stream_zero()?;
        self.header.check_max_frame_size(settings)?;

        //   Receipt of a PING frame with a length field value other than 8 MUST
        //   be treated as a connection error (Section 5.4.1) of type FRAME_SIZE_ERROR.
        if self.header.payload_length != Self::PAYLOAD_LENGTH {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("PING payload must be 8 octets"));
        }

        Ok(())
    }
}
