use dashmap::DashMap;
use tracing::debug;

/// Which guilds the bot can currently deliver to.
///
/// Fed by gateway lifecycle events. A guild that has never been reported is
/// treated as unavailable.
#[derive(Debug, Default)]
pub struct CommunityAvailability {
    communities: DashMap<String, bool>,
}

impl CommunityAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, community_id: &str) {
        debug!(community = community_id, "Guild is available");
        self.communities.insert(community_id.to_string(), true);
    }

    pub fn set_inactive(&self, community_id: &str) {
        debug!(community = community_id, "Guild is unavailable");
        self.communities.insert(community_id.to_string(), false);
    }

    pub fn forget(&self, community_id: &str) {
        self.communities.remove(community_id);
    }

    pub fn is_active(&self, community_id: &str) -> bool {
        self.communities
            .get(community_id)
            .map(|entry| *entry.value())
            .unwrap_or(false)
    }
}
