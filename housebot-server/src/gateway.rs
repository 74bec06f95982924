use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use twilight_gateway::{Event, EventTypeFlags, Shard, StreamExt};
use twilight_model::gateway::payload::incoming::GuildCreate;

use crate::commands;
use crate::context::BotContext;

pub const EVENT_TYPES: EventTypeFlags = EventTypeFlags::READY
    .union(EventTypeFlags::GUILD_CREATE)
    .union(EventTypeFlags::GUILD_DELETE)
    .union(EventTypeFlags::MESSAGE_CREATE);
// Close frames are always delivered by `next_event` (no flag exists for them).

/// Drives one shard: guild availability goes to the monitor, messages to the
/// command handler. Returns once the shard is closed after shutdown.
pub async fn run_shard(mut shard: Shard, ctx: Arc<BotContext>) {
    let shard_id = shard.id().number();
    info!("Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EVENT_TYPES).await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                warn!("Shard {shard_id} => error receiving event: {e:?}");
                continue;
            }
        };

        let Some(monitor) = ctx.monitor() else {
            debug!("Shard {shard_id} => monitor session gone; stopping");
            break;
        };

        match event {
            Event::Ready(ready) => {
                info!("Shard {shard_id} => READY as {} (ID={})", ready.user.name, ready.user.id);
            }
            Event::GuildCreate(guild) => {
                let community_id = guild.id().to_string();
                match &*guild {
                    GuildCreate::Available(_) => monitor.set_community_active(&community_id),
                    GuildCreate::Unavailable(_) => monitor.set_community_inactive(&community_id),
                }
            }
            Event::GuildDelete(deleted) => {
                let community_id = deleted.id.to_string();
                if deleted.unavailable.unwrap_or(false) {
                    monitor.set_community_inactive(&community_id);
                } else {
                    let removed = monitor.remove_community(&community_id).await;
                    info!(community = %community_id, removed, "Removed from guild");
                }
            }
            Event::MessageCreate(msg) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(commands::handle_message(ctx, monitor, msg.0));
            }
            Event::GatewayClose(frame) => {
                if monitor.is_closed() {
                    debug!("Shard {shard_id} => closed for shutdown");
                    break;
                }
                warn!("Shard {shard_id} => gateway closed ({frame:?}); reconnecting");
            }
            other => {
                trace!("Shard {shard_id} => unhandled event: {:?}", other.kind());
            }
        }
    }

    info!("Shard {shard_id} event loop ended.");
}
