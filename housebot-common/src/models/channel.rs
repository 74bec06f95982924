use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::discord::DiscordEmbed;

/// Twitch logins are case-insensitive; every map key goes through this.
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

/// Outcome of a registration call. Neither variant is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

/// Opaque handle to a message posted on the messaging platform
/// (a Discord message ID rendered as a string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub String);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the last poll saw for a live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub title: String,
    pub game: String,
    pub viewer_count: u32,
    /// Helix template with `{width}` / `{height}` placeholders.
    pub thumbnail_url: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSegment {
    pub game: String,
    pub started_at: DateTime<Utc>,
    /// `None` while this is the active segment.
    pub ended_at: Option<DateTime<Utc>>,
}

/// A game reported by Twitch that differs from the active segment and has
/// not yet persisted long enough to open a segment of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingGame {
    pub game: String,
    pub first_seen: DateTime<Utc>,
}

/// Delivery state for one (guild, Discord channel) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub handle: Option<MessageHandle>,
    pub last_update: Option<DateTime<Utc>>,
    pub notified: bool,
}

impl Subscription {
    /// Drops the outstanding live message, returning it.
    pub fn reset(&mut self) -> Option<MessageHandle> {
        self.notified = false;
        self.last_update = None;
        self.handle.take()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedChannel {
    pub login: String,
    pub display_name: String,
    pub logo_url: Option<String>,
    pub profile_updated_at: Option<DateTime<Utc>>,

    pub stream: Option<StreamSnapshot>,
    pub ended_at: Option<DateTime<Utc>>,
    pub games: Vec<GameSegment>,
    pub pending_game: Option<PendingGame>,
    /// Confirmed (debounced) liveness, flipped only by the dispatcher.
    pub is_live: bool,
    /// Summary of the last confirmed session, for live cards whose post
    /// completed after the session had already ended.
    #[serde(skip)]
    pub last_summary: Option<DiscordEmbed>,

    /// guild id -> Discord channel id -> subscription
    pub subscriptions: BTreeMap<String, BTreeMap<String, Subscription>>,
}

impl TrackedChannel {
    pub fn new(
        login: &str,
        display_name: String,
        logo_url: Option<String>,
        profile_updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            login: normalize_login(login),
            display_name,
            logo_url,
            profile_updated_at: Some(profile_updated_at),
            stream: None,
            ended_at: None,
            games: Vec::new(),
            pending_game: None,
            is_live: false,
            last_summary: None,
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn has_subscription(&self, community_id: &str, destination_id: &str) -> bool {
        self.subscriptions
            .get(community_id)
            .is_some_and(|destinations| destinations.contains_key(destination_id))
    }

    /// Returns false if the pair was already subscribed.
    pub fn add_subscription(&mut self, community_id: &str, destination_id: &str) -> bool {
        let destinations = self
            .subscriptions
            .entry(community_id.to_string())
            .or_default();
        if destinations.contains_key(destination_id) {
            return false;
        }
        destinations.insert(destination_id.to_string(), Subscription::default());
        true
    }

    /// Removes the pair, dropping the guild entry once it is empty.
    pub fn remove_subscription(&mut self, community_id: &str, destination_id: &str) -> bool {
        let Some(destinations) = self.subscriptions.get_mut(community_id) else {
            return false;
        };
        let removed = destinations.remove(destination_id).is_some();
        if destinations.is_empty() {
            self.subscriptions.remove(community_id);
        }
        removed
    }

    pub fn subscription_mut(
        &mut self,
        community_id: &str,
        destination_id: &str,
    ) -> Option<&mut Subscription> {
        self.subscriptions
            .get_mut(community_id)
            .and_then(|destinations| destinations.get_mut(destination_id))
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.values().map(|d| d.len()).sum()
    }

    pub fn watches_destination(&self, destination_id: &str) -> bool {
        self.subscriptions
            .values()
            .any(|destinations| destinations.contains_key(destination_id))
    }

    pub fn twitch_url(&self) -> String {
        format!("https://twitch.tv/{}", self.login)
    }
}
