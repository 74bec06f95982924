//! Turns confirmed live/offline transitions into Discord messages.
//!
//! Decisions are made under the channel write lock; the network calls run
//! as spawned tasks that write their outcome back through the same lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::MonitorConfig;
use crate::monitor::cards::{live_card, summary_card};
use crate::monitor::communities::CommunityAvailability;
use crate::monitor::poller::{begin_session, close_session, discard_session};
use crate::monitor::store::SharedChannels;
use crate::utils::time::elapsed_exceeds;
use housebot_common::models::discord::DiscordEmbed;
use housebot_common::models::{MessageHandle, TrackedChannel};
use housebot_common::traits::api::MessagingClient;

/// One message operation for one subscription.
#[derive(Debug)]
enum Delivery {
    Announce {
        login: String,
        community: String,
        destination: String,
        embed: DiscordEmbed,
    },
    Refresh {
        login: String,
        community: String,
        destination: String,
        handle: MessageHandle,
        embed: DiscordEmbed,
    },
    Summarize {
        login: String,
        destination: String,
        handle: MessageHandle,
        embed: DiscordEmbed,
    },
}

pub struct NotificationDispatcher {
    channels: SharedChannels,
    communities: Arc<CommunityAvailability>,
    messenger: Arc<dyn MessagingClient>,
    config: MonitorConfig,
}

impl NotificationDispatcher {
    pub fn new(
        channels: SharedChannels,
        communities: Arc<CommunityAvailability>,
        messenger: Arc<dyn MessagingClient>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            channels,
            communities,
            messenger,
            config,
        }
    }

    /// Evaluates every tracked channel and spawns the resulting deliveries.
    pub async fn dispatch(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let mut pending = Vec::new();
        {
            let mut channels = self.channels.write().await;
            for channel in channels.values_mut() {
                self.evaluate(channel, now, &mut pending);
            }
        }

        if !pending.is_empty() {
            debug!(count = pending.len(), "Spawning notification deliveries");
        }
        pending.into_iter().map(|delivery| self.spawn(delivery)).collect()
    }

    fn evaluate(&self, channel: &mut TrackedChannel, now: DateTime<Utc>, out: &mut Vec<Delivery>) {
        let threshold = self.config.state_change_threshold;

        if let Some(stream) = channel.stream.clone() {
            if !elapsed_exceeds(now, stream.started_at, threshold) {
                return;
            }
            if !channel.is_live {
                info!(channel = %channel.login, game = %stream.game, "Channel went live");
                begin_session(channel, &stream.game, stream.started_at);
                channel.last_summary = None;
                channel.is_live = true;
            }

            let embed = live_card(channel, &stream, now, &self.config);
            let refresh = self.config.live_message_refresh;
            for (community, destinations) in channel.subscriptions.iter_mut() {
                if !self.communities.is_active(community) {
                    continue;
                }
                for (destination, subscription) in destinations.iter_mut() {
                    if !subscription.notified {
                        subscription.notified = true;
                        subscription.last_update = Some(now);
                        out.push(Delivery::Announce {
                            login: channel.login.clone(),
                            community: community.clone(),
                            destination: destination.clone(),
                            embed: embed.clone(),
                        });
                        continue;
                    }

                    let Some(handle) = subscription.handle.clone() else {
                        // Announcement still in flight.
                        continue;
                    };
                    let stale = subscription
                        .last_update
                        .is_none_or(|at| elapsed_exceeds(now, at, refresh));
                    if stale {
                        subscription.last_update = Some(now);
                        out.push(Delivery::Refresh {
                            login: channel.login.clone(),
                            community: community.clone(),
                            destination: destination.clone(),
                            handle,
                            embed: embed.clone(),
                        });
                    }
                }
            }
            return;
        }

        let Some(ended_at) = channel.ended_at else {
            return;
        };
        if !elapsed_exceeds(now, ended_at, threshold) {
            return;
        }
        if !channel.is_live {
            discard_session(channel);
            return;
        }

        close_session(channel, ended_at);
        let started_at = channel
            .games
            .first()
            .map(|segment| segment.started_at)
            .unwrap_or(ended_at);
        let embed = summary_card(channel, started_at, ended_at, &channel.games);
        info!(channel = %channel.login, "Channel went offline");

        for (community, destinations) in channel.subscriptions.iter_mut() {
            let active = self.communities.is_active(community);
            for (destination, subscription) in destinations.iter_mut() {
                let Some(handle) = subscription.reset() else {
                    continue;
                };
                if !active {
                    debug!(
                        channel = %channel.login,
                        community = %community,
                        destination = %destination,
                        "Guild unavailable; dropping stream summary"
                    );
                    continue;
                }
                out.push(Delivery::Summarize {
                    login: channel.login.clone(),
                    destination: destination.clone(),
                    handle,
                    embed: embed.clone(),
                });
            }
        }

        channel.last_summary = Some(embed);
        channel.games.clear();
        channel.pending_game = None;
        channel.is_live = false;
    }

    fn spawn(&self, delivery: Delivery) -> JoinHandle<()> {
        let channels = Arc::clone(&self.channels);
        let messenger = Arc::clone(&self.messenger);
        tokio::spawn(async move {
            deliver(&channels, messenger.as_ref(), delivery).await;
        })
    }
}

async fn deliver(channels: &SharedChannels, messenger: &dyn MessagingClient, delivery: Delivery) {
    match delivery {
        Delivery::Announce {
            login,
            community,
            destination,
            embed,
        } => {
            let result = messenger.send_embed(&destination, &embed).await;
            let late_summary = {
                let mut channels = channels.write().await;
                let Some(channel) = channels.get_mut(&login) else {
                    if let Err(e) = result {
                        warn!(channel = %login, destination = %destination, error = %e, "Failed to post live notification");
                    }
                    return;
                };
                let summary = if channel.is_live { None } else { channel.last_summary.clone() };

                match (result, channel.subscription_mut(&community, &destination)) {
                    (Ok(handle), Some(subscription)) if subscription.notified => {
                        debug!(channel = %login, destination = %destination, message = %handle, "Posted live notification");
                        subscription.handle = Some(handle);
                        None
                    }
                    (Ok(handle), Some(_)) => summary.map(|summary| (handle, summary)),
                    (Ok(handle), None) => {
                        debug!(
                            channel = %login,
                            destination = %destination,
                            message = %handle,
                            "Subscription removed while posting; not tracking message"
                        );
                        None
                    }
                    (Err(e), subscription) => {
                        warn!(channel = %login, destination = %destination, error = %e, "Failed to post live notification");
                        if let Some(subscription) = subscription {
                            subscription.notified = false;
                            subscription.last_update = None;
                        }
                        None
                    }
                }
            };

            // The session ended while the card was being posted.
            if let Some((handle, summary)) = late_summary {
                debug!(channel = %login, destination = %destination, message = %handle, "Session ended while posting; summarizing");
                if let Err(e) = messenger.edit_embed(&destination, &handle, &summary).await {
                    warn!(
                        channel = %login,
                        destination = %destination,
                        message = %handle,
                        error = %e,
                        "Failed to replace late live notification with summary"
                    );
                }
            }
        }
        Delivery::Refresh {
            login,
            community,
            destination,
            handle,
            embed,
        } => {
            let Err(e) = messenger.edit_embed(&destination, &handle, &embed).await else {
                return;
            };
            warn!(
                channel = %login,
                destination = %destination,
                message = %handle,
                error = %e,
                "Failed to refresh live notification; will post a new one"
            );
            let mut channels = channels.write().await;
            if let Some(subscription) = channels
                .get_mut(&login)
                .and_then(|channel| channel.subscription_mut(&community, &destination))
                .filter(|subscription| subscription.handle.as_ref() == Some(&handle))
            {
                subscription.reset();
            }
        }
        Delivery::Summarize {
            login,
            destination,
            handle,
            embed,
        } => match messenger.edit_embed(&destination, &handle, &embed).await {
            Ok(()) => {
                debug!(channel = %login, destination = %destination, message = %handle, "Posted stream summary");
            }
            Err(e) => {
                warn!(
                    channel = %login,
                    destination = %destination,
                    message = %handle,
                    error = %e,
                    "Failed to replace live notification with summary"
                );
            }
        },
    }
}
