//! Discord embeds for live and end-of-stream notifications.

use chrono::{DateTime, Utc};

use crate::MonitorConfig;
use crate::utils::time::{format_duration, time_bucket};
use housebot_common::models::discord::{
    DiscordColor, DiscordEmbed, DiscordEmbedAuthor, DiscordEmbedFooter, DiscordEmbedImage,
};
use housebot_common::models::{GameSegment, StreamSnapshot, TrackedChannel};

const PREVIEW_WIDTH: &str = "1280";
const PREVIEW_HEIGHT: &str = "720";

fn author(channel: &TrackedChannel) -> DiscordEmbedAuthor {
    DiscordEmbedAuthor {
        name: channel.display_name.clone(),
        url: Some(channel.twitch_url()),
        icon_url: channel.logo_url.clone(),
    }
}

fn game_label(game: &str) -> &str {
    if game.is_empty() { "Unknown Game" } else { game }
}

/// Fills the Helix size placeholders and appends a cache-buster that only
/// changes once per `thumbnail_refresh` window, so Discord re-fetches the
/// preview at most that often.
pub fn preview_url(template: &str, now: DateTime<Utc>, config: &MonitorConfig) -> String {
    let url = template
        .replace("{width}", PREVIEW_WIDTH)
        .replace("{height}", PREVIEW_HEIGHT);
    format!("{}?t={}", url, time_bucket(now, config.thumbnail_refresh))
}

pub fn live_card(
    channel: &TrackedChannel,
    stream: &StreamSnapshot,
    now: DateTime<Utc>,
    config: &MonitorConfig,
) -> DiscordEmbed {
    let game = game_label(&stream.game);

    let mut embed = DiscordEmbed::new();
    embed.title = Some(format!("{} is streaming {}", channel.display_name, game));
    if !stream.title.is_empty() {
        embed.description = Some(stream.title.clone());
    }
    embed.url = Some(channel.twitch_url());
    embed.color = Some(DiscordColor::TWITCH_PURPLE);
    embed.author = Some(author(channel));

    embed.add_field("Game", game, true);
    embed.add_field("Viewers", stream.viewer_count.to_string(), true);
    embed.add_field("Uptime", format_duration(stream.started_at, now), true);

    if !stream.thumbnail_url.is_empty() {
        embed.image = Some(DiscordEmbedImage {
            url: preview_url(&stream.thumbnail_url, now, config),
        });
    }
    embed.footer = Some(DiscordEmbedFooter {
        text: "Live on Twitch".to_string(),
    });
    embed.timestamp = Some(now);
    embed
}

/// End-of-session card. `games` must already be closed out.
pub fn summary_card(
    channel: &TrackedChannel,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    games: &[GameSegment],
) -> DiscordEmbed {
    let mut embed = DiscordEmbed::new();
    embed.title = Some(format!("{} was live", channel.display_name));
    embed.url = Some(channel.twitch_url());
    embed.color = Some(DiscordColor::DARK_GREY);
    embed.author = Some(author(channel));

    embed.add_field("Started", format!("<t:{}:f>", started_at.timestamp()), true);
    embed.add_field("Ended", format!("<t:{}:f>", ended_at.timestamp()), true);
    embed.add_field("Duration", format_duration(started_at, ended_at), true);

    if !games.is_empty() {
        let lines: Vec<String> = games
            .iter()
            .map(|segment| {
                let end = segment.ended_at.unwrap_or(ended_at);
                format!("{}: {}", game_label(&segment.game), format_duration(segment.started_at, end))
            })
            .collect();
        embed.add_field("Games", lines.join("\n"), false);
    }

    embed.footer = Some(DiscordEmbedFooter {
        text: "Stream ended".to_string(),
    });
    embed.timestamp = Some(ended_at);
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn channel() -> TrackedChannel {
        let t = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        TrackedChannel::new("shroud", "shroud".into(), Some("https://cdn/logo.png".into()), t)
    }

    #[test]
    fn test_preview_url_fills_template() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let url = preview_url(
            "https://static-cdn.jtvnw.net/previews-ttv/live_user_shroud-{width}x{height}.jpg",
            now,
            &MonitorConfig::default(),
        );
        assert!(url.starts_with("https://static-cdn.jtvnw.net/previews-ttv/live_user_shroud-1280x720.jpg?t="));
    }

    #[test]
    fn test_live_card_uses_logo_as_author_icon() {
        let now = Utc.timestamp_opt(1_700_000_600, 0).single().unwrap();
        let stream = StreamSnapshot {
            title: "ranked grind".into(),
            game: "Valorant".into(),
            viewer_count: 1234,
            thumbnail_url: "https://static-cdn.jtvnw.net/shroud-{width}x{height}.jpg".into(),
            started_at: now - Duration::minutes(10),
        };

        let card = live_card(&channel(), &stream, now, &MonitorConfig::default());
        let author = card.author.as_ref().expect("author is set");
        assert_eq!(author.icon_url.as_deref(), Some("https://cdn/logo.png"));
        assert_eq!(author.url.as_deref(), Some("https://twitch.tv/shroud"));
        assert_eq!(card.field("Uptime").map(|f| f.value.as_str()), Some("10m 00s"));
        assert!(card.image.is_some_and(|image| image.url.contains("1280x720")));
    }

    #[test]
    fn test_summary_lists_each_game() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let switch = start + Duration::minutes(30);
        let end = start + Duration::minutes(90);
        let games = vec![
            GameSegment { game: "Valorant".into(), started_at: start, ended_at: Some(switch) },
            GameSegment { game: "".into(), started_at: switch, ended_at: Some(end) },
        ];

        let card = summary_card(&channel(), start, end, &games);
        assert_eq!(card.title.as_deref(), Some("shroud was live"));
        assert_eq!(card.field("Duration").map(|f| f.value.as_str()), Some("1h 30m 00s"));
        let lines = card.field("Games").map(|f| f.value.clone()).unwrap_or_default();
        assert_eq!(lines, "Valorant: 30m 00s\nUnknown Game: 1h 00m 00s");
    }
}
