//! `housebot channel ...` text commands.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use twilight_model::channel::Message;
use twilight_model::guild::PartialMember;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker};

use crate::context::BotContext;
use housebot_common::models::discord::DiscordEmbed;
use housebot_common::models::{normalize_login, RegisterOutcome};
use housebot_core::platforms::discord::build_embed;
use housebot_core::{Error, LiveMonitor};

pub const COMMAND_PREFIX: &str = "housebot";
pub const USAGE: &str = "Proper usage is:\nhousebot channel list\nhousebot channel [add/remove] <Twitch Channel>";

const USER_MESSAGE_DELETE_DELAY: Duration = Duration::from_secs(1);
const REPLY_DELETE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    List,
    Add(String),
    Remove(String),
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Message does not start with the prefix.
    Ignored,
    /// Prefixed, but not a command we know.
    Unknown,
    Channel(ChannelCommand),
}

pub fn parse(content: &str) -> Invocation {
    let mut words = content.split_whitespace();
    match words.next() {
        Some(prefix) if prefix.eq_ignore_ascii_case(COMMAND_PREFIX) => {}
        _ => return Invocation::Ignored,
    }
    if words.next() != Some("channel") {
        return Invocation::Unknown;
    }

    let args: Vec<&str> = words.collect();
    let command = match args.as_slice() {
        ["list"] => ChannelCommand::List,
        ["add", login] => ChannelCommand::Add(normalize_login(login)),
        ["remove", login] => ChannelCommand::Remove(normalize_login(login)),
        _ => ChannelCommand::Usage,
    };
    Invocation::Channel(command)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain text, removed again after a while.
    Text(String),
    /// Kept in the channel.
    Embed(DiscordEmbed),
}

pub fn list_embed(display_names: &[String]) -> DiscordEmbed {
    let mut embed = DiscordEmbed::new();
    embed.title = Some("This Discord channel is monitoring".to_string());
    if display_names.is_empty() {
        embed.description = Some("No Twitch channels yet.".to_string());
    }
    for (i, name) in display_names.iter().enumerate() {
        embed.add_field(format!("Channel {}", i + 1), name.clone(), false);
    }
    embed
}

/// Runs a channel command for `destination_id` in `community_id`.
pub async fn execute(
    monitor: &LiveMonitor,
    community_id: &str,
    destination_id: &str,
    command: &ChannelCommand,
) -> Reply {
    let registry = monitor.registry();
    match command {
        ChannelCommand::List => {
            Reply::Embed(list_embed(&registry.list_tracked_by_destination(destination_id).await))
        }
        ChannelCommand::Add(login) => {
            let text = match registry.register(login, community_id, destination_id).await {
                Ok(RegisterOutcome::Created) => {
                    format!("{login}'s Twitch channel successfully added to this Discord channel.")
                }
                Ok(RegisterOutcome::AlreadyExists) => {
                    format!("{login}'s Twitch channel is already added to this Discord channel.")
                }
                Err(Error::ChannelNotFound(_)) => format!("The Twitch channel {login} does not exist."),
                Err(e) => {
                    warn!(channel = %login, destination = destination_id, error = %e, "Failed to register channel");
                    "Error registering channel. Connection to Twitch may be down.".to_string()
                }
            };
            Reply::Text(text)
        }
        ChannelCommand::Remove(login) => {
            let text = if registry.unregister(login, community_id, destination_id).await {
                format!("{login}'s Twitch channel successfully removed from this Discord channel.")
            } else {
                format!("{login}'s Twitch channel is not added to this Discord channel.")
            };
            Reply::Text(text)
        }
        ChannelCommand::Usage => Reply::Text(USAGE.to_string()),
    }
}

/// Entry point from the gateway for every guild message.
pub async fn handle_message(ctx: Arc<BotContext>, monitor: Arc<LiveMonitor>, msg: Message) {
    if msg.author.bot {
        return;
    }
    let Some(guild_id) = msg.guild_id else {
        return;
    };

    let command = match parse(&msg.content) {
        Invocation::Ignored => return,
        Invocation::Unknown => {
            info!(user = %msg.author.name, command = %msg.content, "Invalid command");
            return;
        }
        Invocation::Channel(command) => command,
    };
    info!(
        user = %msg.author.name,
        command = %msg.content,
        destination = %msg.channel_id,
        community = %guild_id,
        "Command received"
    );

    spawn_delete(Arc::clone(&ctx), msg.channel_id, msg.id, USER_MESSAGE_DELETE_DELAY);

    if !is_moderator(&ctx, guild_id, msg.member.as_ref()).await {
        info!(user = %msg.author.name, "User tried to issue a command without the moderator role");
        return;
    }

    let reply = execute(
        &monitor,
        &guild_id.to_string(),
        &msg.channel_id.to_string(),
        &command,
    )
    .await;

    if let Err(e) = send_reply(&ctx, msg.channel_id, reply).await {
        warn!(destination = %msg.channel_id, error = %e, "Failed to send command reply");
    }
}

async fn send_reply(ctx: &Arc<BotContext>, channel_id: Id<ChannelMarker>, reply: Reply) -> Result<(), Error> {
    match reply {
        Reply::Text(text) => {
            let message = ctx
                .http
                .create_message(channel_id)
                .content(&text)
                .await
                .map_err(|e| Error::Delivery(e.to_string()))?
                .model()
                .await
                .map_err(|e| Error::Delivery(e.to_string()))?;
            spawn_delete(Arc::clone(ctx), channel_id, message.id, REPLY_DELETE_DELAY);
        }
        Reply::Embed(embed) => {
            let embeds = [build_embed(&embed)?];
            ctx.http
                .create_message(channel_id)
                .embeds(&embeds)
                .await
                .map_err(|e| Error::Delivery(e.to_string()))?;
        }
    }
    Ok(())
}

/// True when the member holds a guild role named like the configured
/// moderator role.
async fn is_moderator(ctx: &BotContext, guild_id: Id<GuildMarker>, member: Option<&PartialMember>) -> bool {
    let Some(member) = member else {
        return false;
    };

    let roles = match ctx.http.roles(guild_id).await {
        Ok(response) => match response.models().await {
            Ok(roles) => roles,
            Err(e) => {
                warn!(community = %guild_id, error = %e, "Failed to decode guild roles");
                return false;
            }
        },
        Err(e) => {
            warn!(community = %guild_id, error = %e, "Failed to fetch guild roles");
            return false;
        }
    };

    roles
        .iter()
        .filter(|role| role.name.eq_ignore_ascii_case(&ctx.mod_role))
        .any(|role| member.roles.contains(&role.id))
}

fn spawn_delete(
    ctx: Arc<BotContext>,
    channel_id: Id<ChannelMarker>,
    message_id: Id<MessageMarker>,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match ctx.http.delete_message(channel_id, message_id).await {
            Ok(_) => debug!(destination = %channel_id, message = %message_id, "Deleted message"),
            Err(e) => warn!(destination = %channel_id, message = %message_id, error = %e, "Failed to delete message"),
        }
    });
}
