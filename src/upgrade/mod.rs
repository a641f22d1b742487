pub mod connection_context;
pub mod h2c;
pub mod thread_context;
pub mod transport;
pub mod upgrade_handler;
pub mod virtual_connection;
pub mod web_connection;
