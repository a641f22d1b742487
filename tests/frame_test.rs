mod common;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use h2_channel::http2::common_frame::Frame;
use h2_channel::http2::frame_continuation::ContinuationFrame;
use h2_channel::http2::frame_data::DataFrame;
use h2_channel::http2::frame_goaway::GoAwayFrame;
use h2_channel::http2::frame_headers::{HeadersFrame, HeadersFrameOptions};
use h2_channel::http2::frame_ping::PingFrame;
use h2_channel::http2::frame_priority::{PriorityFields, PriorityFrame};
use h2_channel::http2::frame_push_promise::PushPromiseFrame;
use h2_channel::http2::frame_rst_stream::RstStreamFrame;
use h2_channel::http2::frame_settings::SettingsFrame;
use h2_channel::http2::frame_window_update::WindowUpdateFrame;
use h2_channel::http2::http2_conn_options::{ConnectionSettings, PartialConnectionSettings};
use h2_channel::http2::http2_errors::ErrorCode;
use h2_channel::http2::http2_frame::{flags, FrameType, FRAME_HEADER_LENGTH};

fn fragment() -> Bytes {
    Bytes::from_static(b"123456789")
}

fn all_frames() -> Vec<Frame> {
    vec![
        DataFrame::new(11, fragment(), 1, true, true, false).into(),
        HeadersFrame::new(3, fragment(), HeadersFrameOptions {
            padding_length: 2,
            end_stream: true,
            end_headers: true,
            padded: true,
            priority: Some(PriorityFields::new(1, 16, false)),
            reserve_bit: false,
        }).into(),
        PriorityFrame::new(5, 3, 200, true, false).into(),
        RstStreamFrame::new(7, ErrorCode::Cancel, false).into(),
        SettingsFrame::new(0, PartialConnectionSettings {
            header_table_size: Some(4096),
            enable_push: Some(0),
            max_concurrent_streams: Some(100),
            initial_window_size: Some(65_535),
            max_frame_size: Some(16_384),
            max_header_list_size: Some(8192),
        }, false).into(),
        PushPromiseFrame::new(15, fragment(), 17, 3, true, true, false).into(),
        PingFrame::new(0, Bytes::from_static(b"abcdefgh"), false).into(),
        GoAwayFrame::new(0, Bytes::from_static(b"bye"), ErrorCode::NoError, 9, false).into(),
        WindowUpdateFrame::new(1, 1024, false).into(),
        ContinuationFrame::new(3, fragment(), true, false).into(),
    ]
}

#[test]
fn built_length_is_header_plus_payload() {
    for frame in all_frames() {
        let bytes = frame.build_frame_for_write();
        assert_eq!(bytes.len(), FRAME_HEADER_LENGTH + frame.payload_length() as usize,
                   "{:?}", frame.frame_type());
        assert!(frame.initialized());
    }
}

#[test]
fn every_frame_validates_and_decodes_back() {
    let settings = ConnectionSettings::default();
    let mut codec = common::client_codec();

    for frame in all_frames() {
        frame.validate(&settings).unwrap();

        let mut buf = BytesMut::from(&frame.build_frame_for_write()[..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }
}

#[test]
fn padded_data_frame() {
    let frame = DataFrame::new(11, fragment(), 1, true, true, false);
    assert_eq!(frame.header().payload_length, 11);
    assert_eq!(frame.header().stream_id, 11);

    let frame: Frame = frame.into();
    assert!(frame.flag_end_stream_set());
    assert!(frame.flag_padded_set());
    assert!(!frame.flag_ack_set());
    assert!(!frame.flag_priority_set());
    assert!(!frame.flag_end_headers_set());
}

#[test]
fn headers_priority_flag_follows_priority_fields() {
    let plain = HeadersFrame::complete(3, fragment(), false);
    assert!(!plain.flag_priority_set());
    assert!(plain.priority().is_none());
    assert_eq!(plain.header().payload_length, 9);

    let prioritized = HeadersFrame::new(3, fragment(), HeadersFrameOptions {
        end_headers: true,
        priority: Some(PriorityFields::new(1, 16, false)),
        ..Default::default()
    });
    assert!(prioritized.flag_priority_set());
    assert_eq!(prioritized.header().payload_length, 14);
}

#[test]
fn padded_push_promise_frame() {
    let frame = PushPromiseFrame::new(15, fragment(), 17, 3, false, true, false);
    assert_eq!(frame.header().payload_length, 17);
    assert_eq!(frame.promised_stream_id(), 17);
    assert_eq!(frame.padding_length(), 3);
    assert_eq!(frame.header_block_fragment(), &fragment());
}

#[test]
fn settings_with_six_pairs_is_36_octets() {
    let pairs = (1..=6).map(|id| (id as u16, 100)).collect();
    let frame = SettingsFrame::from_pairs(0, pairs, false);
    assert_eq!(frame.header().payload_length, 36);
    assert_eq!(frame.build_frame_for_write().len(), FRAME_HEADER_LENGTH + 36);
}

#[test]
fn settings_ack_is_empty_whatever_it_held() {
    let mut frame = SettingsFrame::from_pairs(0, vec![(1, u32::MAX), (3, u32::MAX)], false);
    frame.set_ack_flag();
    assert_eq!(frame.header().payload_length, 0);
    assert_eq!(frame.header().flags, flags::ACK);
    assert!(frame.settings().is_empty());

    let ack = SettingsFrame::ack();
    assert!(ack.flag_ack_set());
    assert_eq!(ack.build_frame_for_write().len(), FRAME_HEADER_LENGTH);
}

#[test]
fn goaway_must_be_on_stream_zero() {
    let settings = ConnectionSettings::default();
    let ok = GoAwayFrame::new(0, Bytes::new(), ErrorCode::ProtocolError, 1, false);
    assert!(ok.validate(&settings).is_ok());

    for sid in [1, 2, 0x7FFF_FFFF] {
        let bad = GoAwayFrame::new(sid, Bytes::new(), ErrorCode::ProtocolError, 1, false);
        let err = bad.validate(&settings).unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }
}

#[test]
fn invalid_frames_are_built_then_rejected() {
    let settings = ConnectionSettings::default();

    let data_on_zero = DataFrame::new(0, fragment(), 0, false, false, false);
    assert_eq!(data_on_zero.validate(&settings).unwrap_err().code(), ErrorCode::ProtocolError);

    let ping_on_stream = PingFrame::new(3, Bytes::from_static(b"abcdefgh"), false);
    assert!(ping_on_stream.validate(&settings).is_err());

    let zero_increment = WindowUpdateFrame::new(5, 0, false);
    let err = zero_increment.validate(&settings).unwrap_err();
    assert_eq!(err.stream_id(), Some(5));

    let self_dependent = PriorityFrame::new(5, 5, 16, false, false);
    assert_eq!(self_dependent.validate(&settings).unwrap_err().code(), ErrorCode::ProtocolError);

    let too_big = DataFrame::new(1, Bytes::from(vec![0u8; 16_385]), 0, false, false, false);
    assert_eq!(too_big.validate(&settings).unwrap_err().code(), ErrorCode::FrameSizeError);
}

#[test]
fn unknown_frame_types_survive_decoding() {
    let mut codec = common::client_codec();
    let mut buf = BytesMut::from(&[0, 0, 2, 0xfa, 0x0, 0, 0, 0, 1, 0xaa, 0xbb][..]);
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.frame_type(), FrameType::Unknown(0xfa));
    assert!(frame.validate(&ConnectionSettings::default()).is_ok());
}
