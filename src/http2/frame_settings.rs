use bytes::{Buf, BufMut, Bytes};
use crate::http2::http2_conn_options::{ConnectionSettings, PartialConnectionSettings};
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{flags, FrameHeader, FrameType, SettingIdentifier};

const SETTING_PAIR_LENGTH: usize = 6;

//    +-------------------------------+
//    |       Identifier (16)         |
//    +-------------------------------+-------------------------------+
//    |                        Value (32)                             |
//    +---------------------------------------------------------------+
//  (https://datatracker.ietf.org/doc/html/rfc7540#section-6.5.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    header: FrameHeader,
    settings: Vec<(u16, u32)>,
}

impl SettingsFrame {

    pub fn new(stream_id: u32, parameters: PartialConnectionSettings, reserve_bit: bool) -> Self {
        Self::from_pairs(stream_id, parameters.pairs(), reserve_bit)
    }

    pub fn from_pairs(stream_id: u32, settings: Vec<(u16, u32)>, reserve_bit: bool) -> Self {
        let payload_length = (settings.len() * SETTING_PAIR_LENGTH) as u32;
        SettingsFrame {
            header: FrameHeader::new(FrameType::Settings, 0, stream_id, reserve_bit, payload_length),
            settings,
        }
    }

    pub fn ack() -> Self {
        let mut frame = SettingsFrame::new(0, PartialConnectionSettings::new(), false);
        frame.set_ack_flag();
        frame
    }

    //   ACK (0x1):  When set, bit 0 indicates that this frame acknowledges
    //      receipt and application of the peer's SETTINGS frame.  When this
    //      bit is set, the payload of the SETTINGS frame MUST be empty.
    pub fn set_ack_flag(&mut self) {
        self.settings.clear();
        self.header.flags = flags::ACK;
        self.header.payload_length = 0;
    }

    /// Parses the payload of a SETTINGS frame or an h2c `HTTP2-Settings` header.
    /// A trailing partial pair is dropped, `validate` reports it from the header length.
    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Self {
        let mut settings = Vec::with_capacity(payload.len() / SETTING_PAIR_LENGTH);
        while payload.remaining() >= SETTING_PAIR_LENGTH {
            let id = payload.get_u16();
            let value = payload.get_u32();
            settings.push((id, value));
        }
        SettingsFrame { header, settings }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn settings(&self) -> &[(u16, u32)] {
        &self.settings
    }

    pub fn flag_ack_set(&self) -> bool {
        self.header.has_flag(flags::ACK)
    }

    fn find(&self, id: SettingIdentifier) -> Option<u32> {
        let id = u16::from(id);
        self.settings.iter().rev().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.find(SettingIdentifier::HeaderTableSize)
    }

    pub fn enable_push(&self) -> Option<u32> {
        self.find(SettingIdentifier::EnablePush)
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.find(SettingIdentifier::MaxConcurrentStreams)
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.find(SettingIdentifier::InitialWindowSize)
    }

    pub fn max_frame_size(&self) -> Option<u32> {
        self.find(SettingIdentifier::MaxFrameSize)
    }

    pub fn max_header_list_size(&self) -> Option<u32> {
        self.find(SettingIdentifier::MaxHeaderListSize)
    }

    pub fn build_frame_for_write(&self) -> Bytes {
        let mut out = self.header.buffer_for_write();
        for (id, value) in &self.settings {
            out.put_u16(*id);
            out.put_u32(*value);
        }
        out.freeze()
    }

    pub fn validate(&self, settings: &ConnectionSettings) -> Result<(), Http2Error> {
        //   If an endpoint receives a SETTINGS frame whose stream identifier
        //   field is anything other than 0x0, the endpoint MUST respond with a
        //   connection error (Section 5.4.1) of type PROTOCOL_ERROR.
        self.header.require_stream_zero()?;
        self.header.check_max_frame_size(settings)?;

        //   Receipt of a SETTINGS frame with the ACK flag set and a length
        //   field value other than 0 MUST be treated as a connection error
        //   (Section 5.4.1) of type FRAME_SIZE_ERROR.
        if self.flag_ack_set() && self.header.payload_length != 0 {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("SETTINGS ack with payload"));
        }

        //   A SETTINGS frame with a length other than a multiple of 6 octets MUST
        //   be treated as a connection error (Section 5.4.1) of type FRAME_SIZE_ERROR.
        if self.header.payload_length as usize % SETTING_PAIR_LENGTH != 0 {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason("SETTINGS payload is not a multiple of 6"));
        }

        for (id, value) in &self.settings {
            ConnectionSettings::check_setting(*id, *value)?;
        }

        Ok(())
    }
}
