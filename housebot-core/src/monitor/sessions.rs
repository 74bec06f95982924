//! Registry of running monitor sessions.
//!
//! An entry is added when a session's poll loop starts and removed by the loop
//! itself when it exits, so event handlers can route to the right monitor
//! through a handle instead of global state.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::monitor::LiveMonitor;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<LiveMonitor>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, monitor: Arc<LiveMonitor>) {
        debug!(session = monitor.session_id(), "Registering monitor session");
        self.sessions.insert(monitor.session_id().to_string(), monitor);
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<LiveMonitor>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<LiveMonitor>> {
        debug!(session = session_id, "Removing monitor session");
        self.sessions.remove(session_id).map(|(_, monitor)| monitor)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
