use bytes::{BufMut, Bytes};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::Http2Error;
use crate::http2::http2_frame::{flags, padded_length, put_padding, strip_padding, FrameHeader, FrameType};

//    +---------------+
//    |Pad Length? (8)|
//    +---------------+-----------------------------------------------+
//    |                            Data (*)                         ...
//    +---------------------------------------------------------------+
//    |                           Padding (*)                       ...
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    header: FrameHeader,
    data: Bytes,
    padding_length: u8,
}

impl DataFrame {

    pub fn new(stream_id: u32,
               data: Bytes,
               padding_length: u8,
               end_stream: bool,
               padded: bool,
               reserve_bit: bool) -> Self
    {
        let mut frame_flags = 0;
        if end_stream {
            frame_flags |= flags::END_STREAM;
        }
        if padded {
            frame_flags |= flags::PADDED;
        }

        let padding_length = if padded { padding_length } else { 0 };
        let payload_length = data.len() as u32 + padded_length(padded, padding_length);

        DataFrame {
            header: FrameHeader::new(FrameType::Data, frame_flags, stream_id, reserve_bit, payload_length),
            data,
            padding_length,
        }
    }

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        let (padding_length, data) = strip_padding(&header, payload);
        DataFrame { header, data, padding_length }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn padding_length(&self) -> u8 {
        self.padding_length
    }

    pub fn flag_end_stream_set(&self) -> bool {
        self.header.has_flag(flags::END_STREAM)
    }

    pub fn flag_padded_set(&self) -> bool {
        self.header.has_flag(flags::PADDED)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        if self.flag_padded_set() {
            out.put_u8(self.padding_length);
        }
        out.extend_from_slice(&self.data);
        if self.flag_padded_set() {
            put_padding(&mut out, self.padding_length);
        }
        out.freeze()
    }

    //    DATA frames MUST be associated with a stream.  If a DATA frame is
    //    received whose stream identifier field is 0x0, the recipient MUST
    //    respond with a connection error (Section 5.4.1) of type PROTOCOL_ERROR.
    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_non_zero_stream()?;
        self.header.check_max_frame_size(settings)?;
        self.header.check_padding(0, self.padding_length)
    }
}
