use crate::upgrade::thread_context::ContextStack;
use crate::upgrade::web_connection::UpgradedConnection;

/// Takes over a connection once the 101 response has been written.
pub trait HttpUpgradeHandler: Send {

    /// Token sent back in the `Upgrade` header of the 101 response.
    fn protocol(&self) -> &str;

    /// WebSocket handlers get a bare web transport connection.
    fn is_web_socket(&self) -> bool {
        false
    }

    /// Runs with the request's saved context pushed on `context`. The handler
    /// owns `connection` from here on.
    fn init(self: Box<Self>, connection: UpgradedConnection, context: &ContextStack) -> anyhow::Result<()>;
}
