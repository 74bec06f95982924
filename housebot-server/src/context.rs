//! Shared handles for the gateway and command handlers.

use std::sync::Arc;

use twilight_http::Client as HttpClient;

use housebot_core::LiveMonitor;
use housebot_core::monitor::sessions::SessionRegistry;

pub struct BotContext {
    pub http: Arc<HttpClient>,
    pub sessions: Arc<SessionRegistry>,
    /// Session this bot's events are routed to.
    pub session_id: String,
    /// Guild role name (case-insensitive) allowed to manage subscriptions.
    pub mod_role: String,
}

impl BotContext {
    pub fn new(
        http: Arc<HttpClient>,
        sessions: Arc<SessionRegistry>,
        session_id: String,
        mod_role: String,
    ) -> Self {
        Self {
            http,
            sessions,
            session_id,
            mod_role,
        }
    }

    /// The running monitor for this bot, or `None` once its poll loop exited.
    pub fn monitor(&self) -> Option<Arc<LiveMonitor>> {
        self.sessions.get(&self.session_id)
    }
}
