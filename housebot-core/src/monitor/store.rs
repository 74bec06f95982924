//! The registration store: which Twitch channels are tracked and which
//! (guild, Discord channel) pairs want to hear about them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Error;
use crate::monitor::persistence::StatePersister;
use crate::platforms::twitch::CredentialManager;
use housebot_common::models::twitch::UserData;
use housebot_common::models::{normalize_login, RegisterOutcome, TrackedChannel};

/// Channel map shared by the store, the poll loop, the dispatcher and
/// delivery tasks. Keys are normalized logins.
pub type SharedChannels = Arc<RwLock<HashMap<String, TrackedChannel>>>;

#[derive(Clone)]
pub struct ChannelRegistry {
    channels: SharedChannels,
    credentials: Arc<CredentialManager>,
    persister: Option<Arc<StatePersister>>,
}

impl ChannelRegistry {
    pub fn new(
        channels: HashMap<String, TrackedChannel>,
        credentials: Arc<CredentialManager>,
        persister: Option<Arc<StatePersister>>,
    ) -> Self {
        Self {
            channels: Arc::new(RwLock::new(channels)),
            credentials,
            persister,
        }
    }

    pub(crate) fn shared(&self) -> SharedChannels {
        Arc::clone(&self.channels)
    }

    /// Subscribes `destination_id` in `community_id` to `login`.
    ///
    /// An untracked login is first looked up on Twitch; if Twitch has no such
    /// user this fails with `Error::ChannelNotFound`.
    pub async fn register(
        &self,
        login: &str,
        community_id: &str,
        destination_id: &str,
    ) -> Result<RegisterOutcome, Error> {
        let login = normalize_login(login);
        let mut profile: Option<UserData> = None;

        let outcome = loop {
            {
                let mut channels = self.channels.write().await;
                if let Some(channel) = channels.get_mut(&login) {
                    break if channel.add_subscription(community_id, destination_id) {
                        RegisterOutcome::Created
                    } else {
                        RegisterOutcome::AlreadyExists
                    };
                }

                if let Some(user) = profile.take() {
                    let logo = Some(user.profile_image_url).filter(|url| !url.is_empty());
                    let mut channel = TrackedChannel::new(&login, user.display_name, logo, Utc::now());
                    channel.add_subscription(community_id, destination_id);
                    info!(channel = %login, "Now tracking Twitch channel");
                    channels.insert(login.clone(), channel);
                    break RegisterOutcome::Created;
                }
            }

            // Not tracked yet: resolve it without holding the lock.
            profile = Some(self.lookup_profile(&login).await?);
        };

        match outcome {
            RegisterOutcome::Created => {
                info!(
                    channel = %login,
                    community = community_id,
                    destination = destination_id,
                    "Registered subscription"
                );
                self.flush();
            }
            RegisterOutcome::AlreadyExists => {
                debug!(channel = %login, destination = destination_id, "Subscription already exists");
            }
        }
        Ok(outcome)
    }

    async fn lookup_profile(&self, login: &str) -> Result<UserData, Error> {
        let token = self.credentials.ensure_valid().await?;
        let users = match self
            .credentials
            .api()
            .get_users(&token, &[login.to_string()])
            .await
        {
            Ok(users) => users,
            Err(Error::Unauthorized(msg)) => {
                self.credentials.invalidate().await;
                return Err(Error::Credential(msg));
            }
            Err(e) => return Err(e),
        };

        users
            .into_iter()
            .find(|user| normalize_login(&user.login) == login)
            .ok_or_else(|| Error::ChannelNotFound(login.to_string()))
    }

    /// Removes one subscription; the channel goes away with its last one.
    /// Returns whether anything was removed.
    pub async fn unregister(&self, login: &str, community_id: &str, destination_id: &str) -> bool {
        let login = normalize_login(login);
        let removed = {
            let mut channels = self.channels.write().await;
            let Some(channel) = channels.get_mut(&login) else {
                return false;
            };
            let removed = channel.remove_subscription(community_id, destination_id);
            if channel.subscription_count() == 0 {
                channels.remove(&login);
                info!(channel = %login, "No subscriptions left; stopped tracking");
            }
            removed
        };

        if removed {
            info!(
                channel = %login,
                community = community_id,
                destination = destination_id,
                "Unregistered subscription"
            );
            self.flush();
        }
        removed
    }

    /// Drops every subscription belonging to a guild the bot has left.
    /// Returns the number of subscriptions removed.
    pub async fn prune_community(&self, community_id: &str) -> usize {
        let removed = {
            let mut channels = self.channels.write().await;
            let mut removed = 0;
            channels.retain(|login, channel| {
                if let Some(destinations) = channel.subscriptions.remove(community_id) {
                    removed += destinations.len();
                }
                let keep = channel.subscription_count() > 0;
                if !keep {
                    debug!(channel = %login, "Pruned last subscription; stopped tracking");
                }
                keep
            });
            removed
        };

        if removed > 0 {
            info!(community = community_id, removed, "Pruned subscriptions for removed guild");
            self.flush();
        }
        removed
    }

    /// Display names of the channels `destination_id` is subscribed to,
    /// ordered by login.
    pub async fn list_tracked_by_destination(&self, destination_id: &str) -> Vec<String> {
        let channels = self.channels.read().await;
        let mut matching: Vec<&TrackedChannel> = channels
            .values()
            .filter(|channel| channel.watches_destination(destination_id))
            .collect();
        matching.sort_by(|a, b| a.login.cmp(&b.login));
        matching.into_iter().map(|c| c.display_name.clone()).collect()
    }

    pub async fn contains(&self, login: &str) -> bool {
        self.channels.read().await.contains_key(&normalize_login(login))
    }

    pub async fn channel(&self, login: &str) -> Option<TrackedChannel> {
        self.channels.read().await.get(&normalize_login(login)).cloned()
    }

    /// Sorted logins of every tracked channel.
    pub async fn logins(&self) -> Vec<String> {
        let mut logins: Vec<String> = self.channels.read().await.keys().cloned().collect();
        logins.sort();
        logins
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn snapshot(&self) -> HashMap<String, TrackedChannel> {
        self.channels.read().await.clone()
    }

    /// Persists the current state and waits for the write.
    pub async fn save(&self) -> Result<(), Error> {
        match &self.persister {
            Some(persister) => persister.save_latest(&self.channels).await,
            None => Ok(()),
        }
    }

    fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.spawn_save(self.shared());
        }
    }
}
