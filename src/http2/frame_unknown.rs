use bytes::Bytes;
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::Http2Error;
use crate::http2::http2_frame::FrameHeader;

//   Implementations MUST ignore and discard any frame that has a type that is unknown.
//   (https://datatracker.ietf.org/doc/html/rfc7540#section-4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    header: FrameHeader,
    payload: Bytes,
}

impl UnknownFrame {

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        UnknownFrame { header, payload }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        out.extend_from_slice(&self.payload);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.check_max_frame_size(settings)
    }
}
