use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{put_u31, read_u31, FrameHeader, FrameType};

/// Exclusive bit, stream dependency and weight, shared by PRIORITY and HEADERS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityFields {
    pub exclusive: bool,
    pub stream_dependency: u32,
    pub weight: u8,
}

impl PriorityFields {

    pub const LENGTH: u32 = 5;

    pub fn new(stream_dependency: u32, weight: u8, exclusive: bool) -> Self {
        PriorityFields { exclusive, stream_dependency, weight }
    }

    pub(crate) fn read(buf: &mut Bytes) -> Self {
        let (exclusive, stream_dependency) = read_u31(buf);
        let weight = buf.get_u8();
        PriorityFields { exclusive, stream_dependency, weight }
    }

    pub(crate) fn write_to(&self, out: &mut BytesMut) {
        put_u31(out, self.exclusive, self.stream_dependency);
        out.put_u8(self.weight);
    }
}


//    +-+-------------------------------------------------------------+
//    |E|                  Stream Dependency (31)                     |
//    +-+-------------+-----------------------------------------------+
//    |   Weight (8)  |
//    +-+-------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityFrame {
    header: FrameHeader,
    fields: PriorityFields,
}

impl PriorityFrame {

    pub fn new(stream_id: u32, stream_dependency: u32, weight: u8, exclusive: bool, reserve_bit: bool) -> Self {
        PriorityFrame {
            header: FrameHeader::new(FrameType::Priority, 0, stream_id, reserve_bit, PriorityFields::LENGTH),
            fields: PriorityFields::new(stream_dependency, weight, exclusive),
        }
    }

    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Self {
        let fields = if payload.len() >= PriorityFields::LENGTH as usize {
            PriorityFields::read(&mut payload)
        } else {
            PriorityFields::default()
        };
        PriorityFrame { header, fields }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn stream_dependency(&self) -> u32 {
        self.fields.stream_dependency
    }

    pub fn weight(&self) -> u8 {
        self.fields.weight
    }

    pub fn exclusive(&self) -> bool {
        self.fields.exclusive
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        self.fields.write_to(&mut out);
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        //   If a PRIORITY frame is received with a stream identifier of 0x0, the
        //   recipient MUST respond with a connection error (Section 5.4.1) of
        //   type PROTOCOL_ERROR.
        self.header.require_non_zero_stream()?;
        self.header.check_max_frame_size(settings)?;

        //   A PRIORITY frame with a length other than 5 octets MUST be treated as
        //   a stream error (Section 5.4.2) of type FRAME_SIZE_ERROR.
        if self.header.payload_length != PriorityFields::LENGTH {
            return Err(Http2Error::stream_error(self.header.stream_id, ErrorCode::FrameSizeError)
                .with_reason("PRIORITY payload must be 5 octets"));
        }

        if self.fields.stream_dependency == self.header.stream_id {
            return Err(Http2Error::stream_error(self.header.stream_id, ErrorCode::ProtocolError)
                .with_reason("stream depends on itself"));
        }

        Ok(())
    }
}
