//! Folds a Get Streams response into per-channel transient state.
//!
//! Only the poll loop calls into this module, so it is the single writer of
//! stream snapshots, end times and game history.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::utils::time::{elapsed_at_least, elapsed_exceeds};
use housebot_common::models::twitch::{StreamData, UserData};
use housebot_common::models::{normalize_login, GameSegment, PendingGame, StreamSnapshot, TrackedChannel};

/// Applies one poll result to every tracked channel. Channels without a live
/// entry in `streams` are considered offline.
pub fn apply_stream_results(
    channels: &mut HashMap<String, TrackedChannel>,
    streams: &[StreamData],
    now: DateTime<Utc>,
    game_dwell: Duration,
) {
    let live: HashMap<String, &StreamData> = streams
        .iter()
        .filter(|stream| stream.is_live())
        .map(|stream| (normalize_login(&stream.user_login), stream))
        .collect();

    for (login, channel) in channels.iter_mut() {
        match live.get(login) {
            Some(stream) => record_live(channel, stream, now, game_dwell),
            None => record_offline(channel, now),
        }
    }
}

fn record_live(channel: &mut TrackedChannel, stream: &StreamData, now: DateTime<Utc>, game_dwell: Duration) {
    if channel.stream.is_none() {
        debug!(channel = %channel.login, started_at = %stream.started_at, "Stream reported live");
    }

    channel.stream = Some(StreamSnapshot {
        title: stream.title.clone(),
        game: stream.game_name.clone(),
        viewer_count: stream.viewer_count,
        thumbnail_url: stream.thumbnail_url.clone(),
        started_at: stream.started_at,
    });
    channel.ended_at = None;

    track_game(channel, &stream.game_name, stream.started_at, now, game_dwell);
}

fn record_offline(channel: &mut TrackedChannel, now: DateTime<Utc>) {
    if channel.stream.take().is_some() {
        debug!(channel = %channel.login, "Stream no longer reported live");
    }
    if channel.ended_at.is_none() {
        channel.ended_at = Some(now);
    }
}

/// Game history for the current session.
///
/// The first report opens a segment at the stream start. A different game is
/// held as a pending candidate and only becomes a segment once it has been
/// reported continuously for `game_dwell`; reporting the active game again
/// discards the candidate, so quick back-and-forth switching never splits.
pub fn track_game(
    channel: &mut TrackedChannel,
    game: &str,
    stream_started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    game_dwell: Duration,
) {
    let Some(active) = channel.games.last() else {
        channel.games.push(GameSegment {
            game: game.to_string(),
            started_at: stream_started_at,
            ended_at: None,
        });
        channel.pending_game = None;
        return;
    };

    if active.game == game {
        channel.pending_game = None;
        return;
    }

    let since = match &channel.pending_game {
        Some(pending) if pending.game == game => pending.first_seen,
        _ => {
            channel.pending_game = Some(PendingGame {
                game: game.to_string(),
                first_seen: now,
            });
            now
        }
    };

    if elapsed_at_least(now, since, game_dwell) {
        if let Some(active) = channel.games.last_mut() {
            active.ended_at = Some(since);
        }
        info!(channel = %channel.login, game, "Game changed");
        channel.games.push(GameSegment {
            game: game.to_string(),
            started_at: since,
            ended_at: None,
        });
        channel.pending_game = None;
    }
}

/// Closes the active segment when the end of a session is confirmed.
pub fn close_session(channel: &mut TrackedChannel, ended_at: DateTime<Utc>) {
    if let Some(active) = channel.games.last_mut() {
        if active.ended_at.is_none() {
            active.ended_at = Some(ended_at);
        }
    }
    channel.pending_game = None;
}

/// Opens the confirmed session at `started_at`. Segments left over from an
/// earlier stream that never got confirmed are dropped.
pub fn begin_session(channel: &mut TrackedChannel, game: &str, started_at: DateTime<Utc>) {
    if channel.games.iter().all(|segment| segment.started_at >= started_at) {
        return;
    }
    debug!(channel = %channel.login, "Dropping game history from an unconfirmed stream");
    channel.games = vec![GameSegment {
        game: game.to_string(),
        started_at,
        ended_at: None,
    }];
    channel.pending_game = None;
}

/// Forgets the history of a stream that went away before it was confirmed.
pub fn discard_session(channel: &mut TrackedChannel) {
    if !channel.games.is_empty() {
        debug!(channel = %channel.login, "Discarding game history from an unconfirmed stream");
    }
    channel.games.clear();
    channel.pending_game = None;
}

/// Logins of live channels whose cached profile is older than `max_age`.
pub fn stale_profiles(
    channels: &HashMap<String, TrackedChannel>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Vec<String> {
    let mut stale: Vec<String> = channels
        .values()
        .filter(|channel| channel.stream.is_some())
        .filter(|channel| match channel.profile_updated_at {
            Some(updated) => elapsed_exceeds(now, updated, max_age),
            None => true,
        })
        .map(|channel| channel.login.clone())
        .collect();
    stale.sort();
    stale
}

pub fn apply_profiles(
    channels: &mut HashMap<String, TrackedChannel>,
    users: &[UserData],
    now: DateTime<Utc>,
) {
    for user in users {
        if let Some(channel) = channels.get_mut(&normalize_login(&user.login)) {
            channel.display_name = user.display_name.clone();
            if !user.profile_image_url.is_empty() {
                channel.logo_url = Some(user.profile_image_url.clone());
            }
            channel.profile_updated_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn channel() -> TrackedChannel {
        TrackedChannel::new("shroud", "shroud".into(), None, t(0))
    }

    const DWELL: Duration = Duration::from_secs(60);

    #[test]
    fn test_game_switch_after_dwell() {
        let mut ch = channel();
        track_game(&mut ch, "Valorant", t(0), t(10), DWELL);
        track_game(&mut ch, "Apex", t(0), t(100), DWELL);
        assert_eq!(ch.games.len(), 1, "candidate only");
        track_game(&mut ch, "Apex", t(0), t(160), DWELL);

        assert_eq!(ch.games.len(), 2);
        assert_eq!(ch.games[0].ended_at, Some(t(100)));
        assert_eq!(ch.games[1].game, "Apex");
        assert_eq!(ch.games[1].started_at, t(100));
        assert!(ch.pending_game.is_none());
    }

    #[test]
    fn test_returning_to_active_game_drops_candidate() {
        let mut ch = channel();
        track_game(&mut ch, "Valorant", t(0), t(0), DWELL);
        track_game(&mut ch, "Apex", t(0), t(10), DWELL);
        track_game(&mut ch, "Valorant", t(0), t(20), DWELL);
        assert!(ch.pending_game.is_none());
        track_game(&mut ch, "Apex", t(0), t(75), DWELL);
        assert_eq!(ch.games.len(), 1);
    }

    #[test]
    fn test_close_session_is_idempotent() {
        let mut ch = channel();
        track_game(&mut ch, "Valorant", t(0), t(0), DWELL);
        close_session(&mut ch, t(500));
        close_session(&mut ch, t(900));
        assert_eq!(ch.games[0].ended_at, Some(t(500)));
    }

    #[test]
    fn test_begin_session_drops_earlier_stream() {
        let mut ch = channel();
        track_game(&mut ch, "Just Chatting", t(0), t(10), DWELL);
        track_game(&mut ch, "Valorant", t(0), t(70), DWELL);
        assert!(ch.pending_game.is_some());

        begin_session(&mut ch, "Valorant", t(60));
        assert_eq!(ch.games.len(), 1);
        assert_eq!(ch.games[0].game, "Valorant");
        assert_eq!(ch.games[0].started_at, t(60));
        assert!(ch.pending_game.is_none());

        // History from the session's own stream is left alone.
        track_game(&mut ch, "Apex", t(60), t(200), DWELL);
        begin_session(&mut ch, "Apex", t(60));
        assert_eq!(ch.games.len(), 1);
        assert!(ch.pending_game.is_some());
    }

    #[test]
    fn test_discard_session_clears_history() {
        let mut ch = channel();
        track_game(&mut ch, "Just Chatting", t(0), t(10), DWELL);
        track_game(&mut ch, "Apex", t(0), t(20), DWELL);
        discard_session(&mut ch);
        assert!(ch.games.is_empty());
        assert!(ch.pending_game.is_none());
    }

    #[test]
    fn test_stale_profiles_only_while_live() {
        let mut channels = HashMap::new();
        let mut live = TrackedChannel::new("a", "A".into(), None, t(0));
        live.stream = Some(StreamSnapshot {
            title: String::new(),
            game: String::new(),
            viewer_count: 0,
            thumbnail_url: String::new(),
            started_at: t(0),
        });
        channels.insert("a".to_string(), live);
        channels.insert("b".to_string(), TrackedChannel::new("b", "B".into(), None, t(0)));

        let later = t(0) + ChronoDuration::days(2);
        let day = Duration::from_secs(24 * 60 * 60);
        assert_eq!(stale_profiles(&channels, later, day), vec!["a".to_string()]);
        assert!(stale_profiles(&channels, t(60), day).is_empty());
    }
}
