pub mod runtime;

pub use runtime::{build_embed, parse_channel_id, DiscordMessenger};
