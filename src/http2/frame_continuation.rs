use bytes::Bytes;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::Http2Error;
use crate::http2::http2_frame::{flags, FrameHeader, FrameType};

//    +---------------------------------------------------------------+
//    |                   Header Block Fragment (*)                 ...
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.10)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    header: FrameHeader,
    header_block_fragment: Bytes,
}

impl ContinuationFrame {

    pub fn new(stream_id: u32, header_block_fragment: Bytes, end_headers: bool, reserve_bit: bool) -> Self {
        let frame_flags = if end_headers { flags::END_HEADERS } else { 0 };
        let payload_length = header_block_fragment.len() as u32;
        ContinuationFrame {
            header: FrameHeader::new(FrameType::Continuation, frame_flags, stream_id, reserve_bit, payload_length),
            header_block_fragment,
        }
    }

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        ContinuationFrame { header, header_block_fragment: payload }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn header_block_fragment(&self) -> &Bytes {
        &self.header_block_fragment
    }

    pub fn flag_end_headers_set(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        out.extend_from_slice(&self.header_block_fragment);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_non_zero_stream()?;
        self.header.check_max_frame_size(settings)
    }
}
