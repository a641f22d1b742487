use std::fmt;
use thiserror::Error;

// Error handling : https://datatracker.ietf.org/doc/html/rfc7540#section-5.4
// Error Code : https://datatracker.ietf.org/doc/html/rfc7540#section-7
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Http2Error {
    #[error("connection error: {code} ({reason})")]
    ConnectionError {
        code: ErrorCode,
        reason: String,
    },

    #[error("stream {stream_id} error: {code} ({reason})")]
    StreamError {
        stream_id: u32,
        code: ErrorCode,
        reason: String,
    },
}

impl Http2Error {

    pub fn stream_error(stream_id: impl Into<u32>, code: ErrorCode) -> Self {
        Http2Error::StreamError {
            stream_id: stream_id.into(),
            code,
            reason: String::new(),
        }
    }

    pub fn connection_error(code: ErrorCode) -> Self {
        Http2Error::ConnectionError {
            code,
            reason: String::new(),
        }
    }

    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        match self {
            Http2Error::ConnectionError { code, .. } => Http2Error::ConnectionError {
                code,
                reason: reason.into(),
            },
            Http2Error::StreamError { stream_id, code, .. } => Http2Error::StreamError {
                stream_id,
                code,
                reason: reason.into(),
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Http2Error::ConnectionError { code, .. } => *code,
            Http2Error::StreamError { code, .. } => *code,
        }
    }

    /// `None` for connection errors.
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            Http2Error::ConnectionError { .. } => None,
            Http2Error::StreamError { stream_id, .. } => Some(*stream_id),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Http2Error::ConnectionError { reason, .. } => reason,
            Http2Error::StreamError { reason, .. } => reason,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Http2Error::ConnectionError { .. })
    }
}


#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {

    // Unknown or unsupported error codes MUST NOT trigger any special behavior.
    // These MAY be treated by an implementation as being equivalent to INTERNAL_ERROR.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            _ => ErrorCode::InternalError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


impl From<ErrorCode> for u32 {
    fn from(value: ErrorCode) -> Self {
        value as u32
    }
}
