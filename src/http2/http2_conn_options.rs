use crate::http2::frame_settings::SettingsFrame;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{
    SettingIdentifier,
    DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_WINDOW_SIZE,
    MAX_ALLOWED_FRAME_SIZE,
    MAX_WINDOW_SIZE,
};

/// Parameters negotiated for one connection. Only a SETTINGS frame mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    header_table_size: u32,
    enable_push: bool,
    max_concurrent_streams: u32,
    initial_window_size: u32,
    max_frame_size: u32,
    max_header_list_size: u32,
}

/// Settings carried by one SETTINGS frame. `None` means the parameter is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConnectionSettings {
    pub header_table_size: Option<u32>,
    pub enable_push: Option<u32>,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: Option<u32>,
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: Option<u32>,
}

impl PartialConnectionSettings {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Present parameters in identifier order.
    pub fn pairs(&self) -> Vec<(u16, u32)> {
        [
            (SettingIdentifier::HeaderTableSize, self.header_table_size),
            (SettingIdentifier::EnablePush, self.enable_push),
            (SettingIdentifier::MaxConcurrentStreams, self.max_concurrent_streams),
            (SettingIdentifier::InitialWindowSize, self.initial_window_size),
            (SettingIdentifier::MaxFrameSize, self.max_frame_size),
            (SettingIdentifier::MaxHeaderListSize, self.max_header_list_size),
        ]
            .into_iter()
            .filter_map(|(id, value)| value.map(|v| (u16::from(id), v)))
            .collect()
    }

    /// Later pairs win, unknown identifiers are skipped.
    pub fn from_pairs(pairs: &[(u16, u32)]) -> Self {
        let mut partial = PartialConnectionSettings::new();
        for (id, value) in pairs {
            match SettingIdentifier::from_u16(*id) {
                Some(SettingIdentifier::HeaderTableSize) => partial.header_table_size = Some(*value),
                Some(SettingIdentifier::EnablePush) => partial.enable_push = Some(*value),
                Some(SettingIdentifier::MaxConcurrentStreams) => partial.max_concurrent_streams = Some(*value),
                Some(SettingIdentifier::InitialWindowSize) => partial.initial_window_size = Some(*value),
                Some(SettingIdentifier::MaxFrameSize) => partial.max_frame_size = Some(*value),
                Some(SettingIdentifier::MaxHeaderListSize) => partial.max_header_list_size = Some(*value),
                None => continue,
            }
        }
        partial
    }
}


// Initial values from https://datatracker.ietf.org/doc/html/rfc7540#section-6.5.2
impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: DEFAULT_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: u32::MAX,
        }
    }
}

impl ConnectionSettings {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_setting(id: u16, value: u32) -> Result<(), Http2Error> {
        match SettingIdentifier::from_u16(id) {
            // Any value other than 0 or 1 MUST be treated as a
            // connection error (Section 5.4.1) of type PROTOCOL_ERROR.
            Some(SettingIdentifier::EnablePush) if value > 1 => {
                Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("SETTINGS_ENABLE_PUSH must be 0 or 1, got {}", value)))
            },
            // Values above the maximum flow-control window size of 2^31-1 MUST
            // be treated as a connection error (Section 5.4.1) of type FLOW_CONTROL_ERROR.
            Some(SettingIdentifier::InitialWindowSize) if value > MAX_WINDOW_SIZE => {
                Err(Http2Error::connection_error(ErrorCode::FlowControlError)
                    .with_reason(format!("SETTINGS_INITIAL_WINDOW_SIZE {} too large", value)))
            },
            // The value advertised by an endpoint MUST be between this initial
            // value and the maximum allowed frame size (2^24-1 or 16,777,215 octets), inclusive.
            Some(SettingIdentifier::MaxFrameSize)
                if !(DEFAULT_MAX_FRAME_SIZE..=MAX_ALLOWED_FRAME_SIZE).contains(&value) => {
                Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                    .with_reason(format!("SETTINGS_MAX_FRAME_SIZE {} out of range", value)))
            },
            _ => Ok(()),
        }
    }

    /// Every parameter is checked before any of them is applied.
    pub fn apply(&mut self, frame: &SettingsFrame) -> Result<(), Http2Error> {
        if frame.flag_ack_set() {
            return Ok(());
        }

        for (id, value) in frame.settings() {
            Self::check_setting(*id, *value)?;
        }

        self.update(PartialConnectionSettings::from_pairs(frame.settings()));
        Ok(())
    }

    pub fn update(&mut self, partial: PartialConnectionSettings) {
        if let Some(v) = partial.header_table_size {
            self.header_table_size = v;
        }
        if let Some(v) = partial.enable_push {
            self.enable_push = v == 1;
        }
        if let Some(v) = partial.max_concurrent_streams {
            self.max_concurrent_streams = v;
        }
        if let Some(v) = partial.initial_window_size {
            self.initial_window_size = v;
        }
        if let Some(v) = partial.max_frame_size {
            self.max_frame_size = v;
        }
        if let Some(v) = partial.max_header_list_size {
            self.max_header_list_size = v;
        }
    }

    /// The parameters that differ from the protocol defaults, for advertising.
    pub fn differences_from_default(&self) -> PartialConnectionSettings {
        let defaults = ConnectionSettings::default();
        let pick = |mine: u32, theirs: u32| if mine != theirs { Some(mine) } else { None };

        PartialConnectionSettings {
            header_table_size: pick(self.header_table_size, defaults.header_table_size),
            enable_push: pick(u32::from(self.enable_push), u32::from(defaults.enable_push)),
            max_concurrent_streams: pick(self.max_concurrent_streams, defaults.max_concurrent_streams),
            initial_window_size: pick(self.initial_window_size, defaults.initial_window_size),
            max_frame_size: pick(self.max_frame_size, defaults.max_frame_size),
            max_header_list_size: pick(self.max_header_list_size, defaults.max_header_list_size),
        }
    }

    pub fn header_table_size(&self) -> u32 {
        self.header_table_size
    }

    pub fn enable_push(&self) -> bool {
        self.enable_push
    }

    pub fn max_concurrent_streams(&self) -> u32 {
        self.max_concurrent_streams
    }

    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    pub fn max_header_list_size(&self) -> u32 {
        self.max_header_list_size
    }
}
