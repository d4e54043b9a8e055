// Application state module
// Everything a request handler needs, shared behind one Arc

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::store::UserStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub users: UserStore,
    /// Connections currently being served
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let users = UserStore::new(&config.store);
        Self {
            config,
            users,
            active_connections: AtomicUsize::new(0),
        }
    }
}
