use async_trait::async_trait;
use twitch_oauth2::AccessToken;

use crate::error::Error;
use crate::models::discord::DiscordEmbed;
use crate::models::twitch::{AppToken, StreamData, TokenValidation, UserData};
use crate::models::MessageHandle;

/// Outbound side of the messaging platform, as used by the live monitor.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Posts `embed` to `destination`, returning a handle for later edits.
    async fn send_embed(&self, destination: &str, embed: &DiscordEmbed)
                        -> Result<MessageHandle, Error>;

    /// Replaces the content of a previously sent message.
    async fn edit_embed(
        &self,
        destination: &str,
        handle: &MessageHandle,
        embed: &DiscordEmbed,
    ) -> Result<(), Error>;
}

/// The slice of the Twitch API the monitor depends on.
#[async_trait]
pub trait StreamingApi: Send + Sync {
    async fn request_app_token(&self) -> Result<AppToken, Error>;

    async fn validate_token(&self, token: &AccessToken) -> Result<TokenValidation, Error>;

    /// Looks up users by login. Unknown logins are simply absent.
    async fn get_users(&self, token: &AccessToken, logins: &[String]) -> Result<Vec<UserData>, Error>;

    /// Returns streams for the logins that are currently broadcasting.
    async fn get_streams(&self, token: &AccessToken, logins: &[String])
                         -> Result<Vec<StreamData>, Error>;
}
