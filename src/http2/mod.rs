pub mod common_frame;
pub mod frame_continuation;
pub mod frame_data;
pub mod frame_goaway;
pub mod frame_headers;
pub mod frame_ping;
pub mod frame_priority;
pub mod frame_push_promise;
pub mod frame_rst_stream;
pub mod frame_settings;
pub mod frame_unknown;
pub mod frame_window_update;
pub mod http2_codec;
pub mod http2_conn_options;
pub mod http2_connection;
pub mod http2_errors;
pub mod http2_frame;
pub mod http2_header_decoder;
pub mod http2_stream;
