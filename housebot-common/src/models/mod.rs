pub mod channel;
pub mod discord;
pub mod twitch;

pub use channel::{
    normalize_login, GameSegment, MessageHandle, PendingGame, RegisterOutcome, StreamSnapshot,
    Subscription, TrackedChannel,
};
