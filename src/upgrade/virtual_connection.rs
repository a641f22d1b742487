use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Set once the connection is handed to an upgrade handler. Read by whoever
/// else holds the connection's `VirtualConnection`.
pub const UPGRADED_CONNECTION: &str = "UPGRADED_WEB_CONNECTION";

/// Set for non-WebSocket upgrades. Holders of the `VirtualConnection` must
/// not expect any stream other than the upgraded one to complete.
pub const CLOSE_NON_UPGRADED_STREAMS: &str = "CLOSE_NON_UPGRADED_STREAMS";

/// Set when an h2c upgrade failed to initialize. The request is then
/// answered over HTTP/1.1 and no upgrade is attempted.
pub const H2_INIT_ERROR: &str = "H2_INIT_ERROR";

const FLAG_SET: &str = "true";

/// Per-connection state map shared by every layer of the channel.
#[derive(Debug, Clone)]
pub struct VirtualConnection {
    id: u64,
    state_map: Arc<RwLock<HashMap<String, String>>>,
}

impl VirtualConnection {

    pub fn new(id: u64) -> Self {
        VirtualConnection { id, state_map: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn put(&self, key: &str, value: impl Into<String>) -> Option<String> {
        self.write_map().insert(key.to_string(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read_map().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write_map().remove(key)
    }

    pub fn set_flag(&self, key: &str) {
        self.put(key, FLAG_SET);
    }

    pub fn is_flag_set(&self, key: &str) -> bool {
        self.read_map().get(key).is_some_and(|v| v == FLAG_SET)
    }

    // The map stays consistent even if a writer panicked.
    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        match self.state_map.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        match self.state_map.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
