use bytes::{BufMut, Bytes};
use crate::http2::http2_conn_options::ConnectionSettings;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{flags, padded_length, put_padding, strip_padding, FrameHeader, FrameType};
use crate::http2::frame_priority::PriorityFields;

//    +---------------+
//    |Pad Length? (8)|
//    +-+-------------+-----------------------------------------------+
//    |E|                 Stream Dependency? (31)                     |
//    +-+-------------+-----------------------------------------------+
//    |  Weight? (8)  |
//    +-+-------------+-----------------------------------------------+
//    |                   Header Block Fragment (*)                 ...
//    +---------------------------------------------------------------+
//    |                           Padding (*)                       ...
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    header: FrameHeader,
    header_block_fragment: Bytes,
    padding_length: u8,
    priority: Option<PriorityFields>,
}

/// Fields of a HEADERS frame. The PRIORITY flag is set exactly when `priority` is `Some`.
#[derive(Debug, Clone, Default)]
pub struct HeadersFrameOptions {
    pub padding_length: u8,
    pub end_stream: bool,
    pub end_headers: bool,
    pub padded: bool,
    pub priority: Option<PriorityFields>,
    pub reserve_bit: bool,
}

impl HeadersFrame {

    pub fn new(stream_id: u32, header_block_fragment: Bytes, options: HeadersFrameOptions) -> Self {
        let mut frame_flags = 0;
        if options.end_stream {
            frame_flags |= flags::END_STREAM;
        }
        if options.end_headers {
            frame_flags |= flags::END_HEADERS;
        }
        if options.padded {
            frame_flags |= flags::PADDED;
        }
        if options.priority.is_some() {
            frame_flags |= flags::PRIORITY;
        }

        let padding_length = if options.padded { options.padding_length } else { 0 };
        let priority_length = if options.priority.is_some() { PriorityFields::LENGTH } else { 0 };
        let payload_length = header_block_fragment.len() as u32
            + priority_length
            + padded_length(options.padded, padding_length);

        HeadersFrame {
            header: FrameHeader::new(FrameType::Headers, frame_flags, stream_id, options.reserve_bit, payload_length),
            header_block_fragment,
            padding_length,
            priority: options.priority,
        }
    }

    /// A HEADERS frame that fits in one frame: END_HEADERS set, no padding or priority.
    pub fn complete(stream_id: u32, header_block_fragment: Bytes, end_stream: bool) -> Self {
        HeadersFrame::new(stream_id, header_block_fragment, HeadersFrameOptions {
            end_stream,
            end_headers: true,
            ..Default::default()
        })
    }

    pub fn decode(header: FrameHeader, payload: Bytes) -> Self {
        let (padding_length, mut content) = strip_padding(&header, payload);

        let mut priority = None;
        if header.has_flag(flags::PRIORITY) {
            if content.len() >= PriorityFields::LENGTH as usize {
                priority = Some(PriorityFields::read(&mut content));
            } else {
                content = Bytes::new();
            }
        }

        HeadersFrame {
            header,
            header_block_fragment: content,
            padding_length,
            priority,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn header_block_fragment(&self) -> &Bytes {
        &self.header_block_fragment
    }

    pub fn padding_length(&self) -> u8 {
        self.padding_length
    }

    pub fn priority(&self) -> Option<&PriorityFields> {
        self.priority.as_ref()
    }

    pub fn flag_end_stream_set(&self) -> bool {
        self.header.has_flag(flags::END_STREAM)
    }

    pub fn flag_end_headers_set(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }

    pub fn flag_padded_set(&self) -> bool {
        self.header.has_flag(flags::PADDED)
    }

    pub fn flag_priority_set(&self) -> bool {
        self.header.has_flag(flags::PRIORITY)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        if self.flag_padded_set() {
            out.put_u8(self.padding_length);
        }
        if let Some(priority) = &self.priority {
            priority.write_to(&mut out);
        }
        out.extend_from_slice(&self.header_block_fragment);
        if self.flag_padded_set() {
            put_padding(&mut out, self.padding_length);
        }
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        self.header.require_non_zero_stream()?;
        self.header.check_max_frame_size(settings)?;

        let priority_length = if self.flag_priority_set() { PriorityFields::LENGTH } else { 0 };
        self.header.check_padding(priority_length, self.padding_length)?;

        //   A stream cannot depend on itself.  An endpoint MUST treat this as a
        //   stream error (Section 5.4.2) of type PROTOCOL_ERROR.
        if let Some(priority) = &self.priority {
            if priority.stream_dependency == self.header.stream_id {
                return Err(Http2Error::stream_error(self.header.stream_id, ErrorCode::ProtocolError)
                    .with_reason("stream depends on itself"));
            }
        }

        Ok(())
    }
}
