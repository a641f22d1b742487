use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use crate::http2::http2_conn_options::{ConnectionSettings, PartialConnectionSettings};
use crate::http2::http2_frame::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW_SIZE, MAX_ALLOWED_FRAME_SIZE, MAX_WINDOW_SIZE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for property {key}")]
    InvalidValue {
        key: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Default,
    Http11Only,
    Http2Allowed,
}

impl ProtocolVersion {
    pub fn http2_enabled(&self) -> bool {
        !matches!(self, ProtocolVersion::Http11Only)
    }
}

impl FromStr for ProtocolVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(ProtocolVersion::Default),
            "1.1" | "http/1.1" => Ok(ProtocolVersion::Http11Only),
            "2" | "2.0" | "http/2" => Ok(ProtocolVersion::Http2Allowed),
            _ => Err(()),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpChannelConfig {
    protocol_version: ProtocolVersion,
    h2_connection_close_timeout: Duration,
    h2_connection_idle_timeout: Duration,
    h2_read_window_size: u32,
    h2_max_concurrent_streams: u32,
    h2_max_frame_size: u32,
    h2_settings_initial_window_size: u32,
    h2_limit_window_update_frames: bool,
    max_request_header_bytes: usize,
}

impl Default for HttpChannelConfig {
    fn default() -> Self {
        HttpChannelConfig {
            protocol_version: ProtocolVersion::Default,
            h2_connection_close_timeout: Duration::from_secs(30),
            h2_connection_idle_timeout: Duration::ZERO,
            h2_read_window_size: DEFAULT_WINDOW_SIZE,
            h2_max_concurrent_streams: 200,
            h2_max_frame_size: 57_344,
            h2_settings_initial_window_size: DEFAULT_WINDOW_SIZE,
            h2_limit_window_update_frames: false,
            max_request_header_bytes: 32_768,
        }
    }
}

/// Clamps `value` into `min..=max`.
pub fn range_limit(key: &str, value: u64, min: u64, max: u64) -> u64 {
    if value < min {
        warn!("config property {} value {} below minimum, using {}", key, value, min);
        min
    } else if value > max {
        warn!("config property {} value {} above maximum, using {}", key, value, max);
        max
    } else {
        value
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

impl HttpChannelConfig {

    pub fn builder() -> HttpChannelConfigBuilder {
        HttpChannelConfigBuilder::new()
    }

    /// Reads the channel properties by name. Unknown properties are ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = HttpChannelConfigBuilder::new();

        for (key, value) in props {
            match key.as_str() {
                "protocolVersion" => {
                    let version = value.parse::<ProtocolVersion>().map_err(|_| ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.clone(),
                    })?;
                    builder.protocol_version(version);
                },
                "h2ConnectionCloseTimeout" => {
                    builder.h2_connection_close_timeout(Duration::from_secs(parse_number(key, value)?));
                },
                "h2ConnectionIdleTimeout" => {
                    builder.h2_connection_idle_timeout(Duration::from_secs(parse_number(key, value)?));
                },
                "h2ReadWindowSize" => {
                    builder.h2_read_window_size(parse_number(key, value)?);
                },
                "h2MaxConcurrentStreams" => {
                    builder.h2_max_concurrent_streams(parse_number(key, value)?);
                },
                "h2MaxFrameSize" => {
                    builder.h2_max_frame_size(parse_number(key, value)?);
                },
                "h2SettingsInitialWindowSize" => {
                    builder.h2_settings_initial_window_size(parse_number(key, value)?);
                },
                "h2LimitWindowUpdateFrames" => {
                    builder.h2_limit_window_update_frames(parse_bool(key, value)?);
                },
                "maxRequestHeaderBytes" => {
                    builder.max_request_header_bytes(parse_number(key, value)?);
                },
                _ => continue,
            }
        }

        Ok(builder.build())
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn http2_enabled(&self) -> bool {
        self.protocol_version.http2_enabled()
    }

    pub fn h2_connection_close_timeout(&self) -> Duration {
        self.h2_connection_close_timeout
    }

    /// `None` when idle connections are kept forever.
    pub fn h2_connection_idle_timeout(&self) -> Option<Duration> {
        if self.h2_connection_idle_timeout.is_zero() {
            None
        } else {
            Some(self.h2_connection_idle_timeout)
        }
    }

    pub fn h2_read_window_size(&self) -> u32 {
        self.h2_read_window_size
    }

    pub fn h2_max_concurrent_streams(&self) -> u32 {
        self.h2_max_concurrent_streams
    }

    pub fn h2_max_frame_size(&self) -> u32 {
        self.h2_max_frame_size
    }

    pub fn h2_settings_initial_window_size(&self) -> u32 {
        self.h2_settings_initial_window_size
    }

    pub fn h2_limit_window_update_frames(&self) -> bool {
        self.h2_limit_window_update_frames
    }

    pub fn max_request_header_bytes(&self) -> usize {
        self.max_request_header_bytes
    }

    /// The settings this server advertises in its first SETTINGS frame.
    pub fn local_settings(&self) -> ConnectionSettings {
        let mut settings = ConnectionSettings::default();
        settings.update(PartialConnectionSettings {
            enable_push: Some(0),
            max_concurrent_streams: Some(self.h2_max_concurrent_streams),
            initial_window_size: Some(self.h2_settings_initial_window_size),
            max_frame_size: Some(self.h2_max_frame_size),
            max_header_list_size: Some(u32::try_from(self.max_request_header_bytes).unwrap_or(u32::MAX)),
            ..Default::default()
        });
        settings
    }
}


pub struct HttpChannelConfigBuilder {
    config: HttpChannelConfig,
}

impl HttpChannelConfigBuilder {

    pub fn new() -> Self {
        HttpChannelConfigBuilder { config: HttpChannelConfig::default() }
    }

    pub fn protocol_version(&mut self, version: ProtocolVersion) -> &mut Self {
        self.config.protocol_version = version;
        self
    }

    pub fn h2_connection_close_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.h2_connection_close_timeout = timeout;
        self
    }

    pub fn h2_connection_idle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.h2_connection_idle_timeout = timeout;
        self
    }

    pub fn h2_read_window_size(&mut self, size: u64) -> &mut Self {
        let size = range_limit("h2ReadWindowSize", size, u64::from(DEFAULT_WINDOW_SIZE), u64::from(MAX_WINDOW_SIZE));
        self.config.h2_read_window_size = size as u32;
        self
    }

    pub fn h2_max_concurrent_streams(&mut self, streams: u64) -> &mut Self {
        let streams = range_limit("h2MaxConcurrentStreams", streams, 1, u64::from(u32::MAX));
        self.config.h2_max_concurrent_streams = streams as u32;
        self
    }

    pub fn h2_max_frame_size(&mut self, size: u64) -> &mut Self {
        let size = range_limit("h2MaxFrameSize", size,
                               u64::from(DEFAULT_MAX_FRAME_SIZE), u64::from(MAX_ALLOWED_FRAME_SIZE));
        self.config.h2_max_frame_size = size as u32;
        self
    }

    pub fn h2_settings_initial_window_size(&mut self, size: u64) -> &mut Self {
        let size = range_limit("h2SettingsInitialWindowSize", size, 0, u64::from(MAX_WINDOW_SIZE));
        self.config.h2_settings_initial_window_size = size as u32;
        self
    }

    pub fn h2_limit_window_update_frames(&mut self, limit: bool) -> &mut Self {
        self.config.h2_limit_window_update_frames = limit;
        self
    }

    pub fn max_request_header_bytes(&mut self, bytes: u64) -> &mut Self {
        let bytes = range_limit("maxRequestHeaderBytes", bytes, 1024, 1 << 24);
        self.config.max_request_header_bytes = bytes as usize;
        self
    }

    pub fn build(&self) -> HttpChannelConfig {
        self.config.clone()
    }
}

impl Default for HttpChannelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
