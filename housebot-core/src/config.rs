//! Tunables for a monitoring session.
//!
//! Defaults mirror the timings the bot has always used: Twitch is queried every
//! ten seconds and a live/offline flip must hold for ninety seconds before any
//! message goes out.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_STATE_CHANGE_THRESHOLD: Duration = Duration::from_secs(90);
pub const DEFAULT_LIVE_MESSAGE_REFRESH: Duration = Duration::from_secs(30);
pub const DEFAULT_THUMBNAIL_REFRESH: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GAME_DWELL: Duration = Duration::from_secs(60);
pub const DEFAULT_PROFILE_REFRESH: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Names the session and its state file.
    pub session_name: String,
    pub data_dir: PathBuf,

    pub poll_interval: Duration,
    /// How long a live/offline report must persist before it is acted on.
    pub state_change_threshold: Duration,
    /// Minimum age of a live card before it is edited with fresh numbers.
    pub live_message_refresh: Duration,
    /// Bucket size for the thumbnail cache-buster.
    pub thumbnail_refresh: Duration,
    /// How long a new game must be reported before a segment switch.
    pub game_dwell: Duration,
    /// Profiles (display name, logo) older than this are re-fetched while live.
    pub profile_refresh: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            session_name: "data".to_string(),
            data_dir: PathBuf::from("data"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state_change_threshold: DEFAULT_STATE_CHANGE_THRESHOLD,
            live_message_refresh: DEFAULT_LIVE_MESSAGE_REFRESH,
            thumbnail_refresh: DEFAULT_THUMBNAIL_REFRESH,
            game_dwell: DEFAULT_GAME_DWELL,
            profile_refresh: DEFAULT_PROFILE_REFRESH,
        }
    }
}

impl MonitorConfig {
    /// `<data_dir>/<session_name>.json`
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.session_name))
    }
}
