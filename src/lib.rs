pub mod config;
pub mod connection;
pub mod connection_reader;
pub mod dispatcher;
pub mod ffdc;
pub mod http2;
pub mod http_object;
pub mod http_status;
pub mod http_type;
pub mod server;
pub mod upgrade;
