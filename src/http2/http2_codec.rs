use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;
use crate::http2::common_frame::Frame;
use crate::http2::http2_errors::{ErrorCode, Http2Error};
use crate::http2::http2_frame::{FrameHeader, RawFrame, CONNECTION_PREFACE, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_LENGTH};

/// Splits a byte stream into frames. Accepts frames up to the locally advertised max frame size.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: u32,
    expect_preface: bool,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameCodec {

    pub fn new(max_frame_size: u32) -> Self {
        FrameCodec { max_frame_size, expect_preface: false }
    }

    /// Consumes the 24-octet client connection preface before the first frame.
    pub fn with_preface(max_frame_size: u32) -> Self {
        FrameCodec { max_frame_size, expect_preface: true }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    fn consume_preface(&mut self, src: &mut BytesMut) -> anyhow::Result<bool> {
        let available = src.len().min(CONNECTION_PREFACE.len());
        if src[..available] != CONNECTION_PREFACE[..available] {
            return Err(Http2Error::connection_error(ErrorCode::ProtocolError)
                .with_reason("invalid connection preface")
                .into());
        }

        if src.len() < CONNECTION_PREFACE.len() {
            return Ok(false);
        }

        src.advance(CONNECTION_PREFACE.len());
        self.expect_preface = false;
        debug!("codec consumed client connection preface.");
        Ok(true)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.expect_preface && !self.consume_preface(src)? {
            return Ok(None);
        }

        let header = match FrameHeader::parse(src) {
            Some(header) => header,
            None => return Ok(None),
        };

        if header.payload_length > self.max_frame_size {
            return Err(Http2Error::connection_error(ErrorCode::FrameSizeError)
                .with_reason(format!("frame of {} octets exceeds max frame size {}",
                                     header.payload_length, self.max_frame_size))
                .into());
        }

        let frame_length = FRAME_HEADER_LENGTH + header.payload_length as usize;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        let mut frame_bytes = src.split_to(frame_length);
        frame_bytes.advance(FRAME_HEADER_LENGTH);

        Ok(Some(Frame::decode(RawFrame::new(header, frame_bytes.freeze()))))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = anyhow::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.build_frame_for_write());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use super::*;
    use crate::http2::frame_data::DataFrame;
    use crate::http2::frame_ping::PingFrame;

    #[test]
    fn waits_for_complete_frame() {
        let frame: Frame = DataFrame::new(1, Bytes::from_static(b"hello"), 0, true, false, false).into();
        let wire = frame.build_frame_for_write();

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&wire[..7]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&wire[7..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn consumes_preface_then_frames() {
        let ping: Frame = PingFrame::new(0, Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]), false).into();

        let mut codec = FrameCodec::with_preface(DEFAULT_MAX_FRAME_SIZE);
        let mut buf = BytesMut::from(&CONNECTION_PREFACE[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&CONNECTION_PREFACE[10..]);
        codec.encode(ping.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ping));
    }

    #[test]
    fn rejects_bad_preface_and_oversized_frames() {
        let mut codec = FrameCodec::with_preface(DEFAULT_MAX_FRAME_SIZE);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.downcast_ref::<Http2Error>().unwrap().code(), ErrorCode::ProtocolError);

        let mut codec = FrameCodec::new(16);
        let frame: Frame = DataFrame::new(1, Bytes::from(vec![0u8; 17]), 0, false, false, false).into();
        let mut buf = BytesMut::from(&frame.build_frame_for_write()[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.downcast_ref::<Http2Error>().unwrap().code(), ErrorCode::FrameSizeError);
    }
}
