//! A monitoring session: tracked channels, their subscriptions, and the
//! machinery that polls Twitch and notifies Discord about them.

pub mod cards;
pub mod communities;
pub mod dispatcher;
pub mod persistence;
pub mod poller;
pub mod sessions;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use twitch_oauth2::AccessToken;

use crate::{Error, MonitorConfig};
use crate::platforms::twitch::CredentialManager;
use communities::CommunityAvailability;
use dispatcher::NotificationDispatcher;
use persistence::StatePersister;
use store::ChannelRegistry;
use housebot_common::models::TrackedChannel;
use housebot_common::models::twitch::StreamData;
use housebot_common::traits::api::{MessagingClient, StreamingApi};

/// What one poll cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Logins sent to Get Streams.
    pub polled: usize,
    /// Channels Twitch reported live.
    pub live: usize,
    pub deliveries: Vec<JoinHandle<()>>,
}

impl CycleReport {
    /// Awaits every delivery spawned by the cycle.
    pub async fn wait_for_deliveries(self) {
        for result in join_all(self.deliveries).await {
            if let Err(e) = result {
                warn!(error = %e, "Delivery task panicked");
            }
        }
    }
}

pub struct LiveMonitor {
    session_id: String,
    config: MonitorConfig,
    registry: ChannelRegistry,
    communities: Arc<CommunityAvailability>,
    credentials: Arc<CredentialManager>,
    dispatcher: NotificationDispatcher,
    shutdown_tx: watch::Sender<bool>,
}

impl LiveMonitor {
    /// Opens the session described by `config`, loading its state file.
    pub async fn open(
        config: MonitorConfig,
        api: Arc<dyn StreamingApi>,
        messenger: Arc<dyn MessagingClient>,
    ) -> Result<Self, Error> {
        let persister = Arc::new(StatePersister::new(config.state_path()));
        let channels = persister.load().await?;
        Ok(Self::with_state(config, api, messenger, channels, Some(persister)))
    }

    /// A session that never touches disk.
    pub fn in_memory(
        config: MonitorConfig,
        api: Arc<dyn StreamingApi>,
        messenger: Arc<dyn MessagingClient>,
    ) -> Self {
        Self::with_state(config, api, messenger, HashMap::new(), None)
    }

    fn with_state(
        config: MonitorConfig,
        api: Arc<dyn StreamingApi>,
        messenger: Arc<dyn MessagingClient>,
        channels: HashMap<String, TrackedChannel>,
        persister: Option<Arc<StatePersister>>,
    ) -> Self {
        let credentials = Arc::new(CredentialManager::new(api));
        let communities = Arc::new(CommunityAvailability::new());
        let registry = ChannelRegistry::new(channels, Arc::clone(&credentials), persister);
        let dispatcher = NotificationDispatcher::new(
            registry.shared(),
            Arc::clone(&communities),
            messenger,
            config.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            session_id: config.session_name.clone(),
            config,
            registry,
            communities,
            credentials,
            dispatcher,
            shutdown_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn communities(&self) -> &CommunityAvailability {
        &self.communities
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    pub fn set_community_active(&self, community_id: &str) {
        self.communities.set_active(community_id);
    }

    pub fn set_community_inactive(&self, community_id: &str) {
        self.communities.set_inactive(community_id);
    }

    /// The bot left the guild for good: forget it and drop its subscriptions.
    pub async fn remove_community(&self, community_id: &str) -> usize {
        self.communities.forget(community_id);
        self.registry.prune_community(community_id).await
    }

    /// One pass of the poll engine at wall-clock time `now`.
    ///
    /// Credential and upstream failures return early without touching channel
    /// state; the caller just waits for the next tick.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, Error> {
        let token = self.credentials.ensure_valid().await?;

        let logins = self.registry.logins().await;
        if logins.is_empty() {
            return Ok(CycleReport::default());
        }

        let streams = self.fetch_streams(&token, &logins).await?;
        let shared = self.registry.shared();
        let stale = {
            let mut channels = shared.write().await;
            poller::apply_stream_results(&mut channels, &streams, now, self.config.game_dwell);
            poller::stale_profiles(&channels, now, self.config.profile_refresh)
        };

        if !stale.is_empty() {
            self.refresh_profiles(&token, &stale, now).await;
        }

        let live = streams.iter().filter(|stream| stream.is_live()).count();
        let deliveries = self.dispatcher.dispatch(now).await;
        Ok(CycleReport {
            polled: logins.len(),
            live,
            deliveries,
        })
    }

    async fn fetch_streams(
        &self,
        token: &AccessToken,
        logins: &[String],
    ) -> Result<Vec<StreamData>, Error> {
        match self.credentials.api().get_streams(token, logins).await {
            Ok(streams) => Ok(streams),
            Err(Error::Unauthorized(msg)) => {
                self.credentials.invalidate().await;
                Err(Error::Credential(msg))
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_profiles(&self, token: &AccessToken, logins: &[String], now: DateTime<Utc>) {
        match self.credentials.api().get_users(token, logins).await {
            Ok(users) => {
                debug!(count = users.len(), "Refreshed channel profiles");
                let shared = self.registry.shared();
                let mut channels = shared.write().await;
                poller::apply_profiles(&mut channels, &users, now);
            }
            Err(e) => warn!(error = %e, "Failed to refresh channel profiles"),
        }
    }

    /// Signals the poll loop to stop. Idempotent.
    pub fn close(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!(session = %self.session_id, "Closing monitor session");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Writes the session state and waits for it to land.
    pub async fn save(&self) -> Result<(), Error> {
        self.registry.save().await
    }
}
