use twitch_oauth2::AccessToken;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;
use crate::platforms::twitch::requests::{helix_get, HELIX_BATCH_LIMIT};
use housebot_common::models::twitch::{UserData, UsersResponse};

/// Resolves logins to profiles via "Get Users". Logins that do not exist are
/// missing from the result rather than an error.
pub async fn fetch_users(
    client: &TwitchHelixClient,
    token: &AccessToken,
    logins: &[String],
) -> Result<Vec<UserData>, Error> {
    let mut users = Vec::new();
    for batch in logins.chunks(HELIX_BATCH_LIMIT) {
        let query: Vec<(&str, &str)> =
            batch.iter().map(|login| ("login", login.as_str())).collect();
        let resp: UsersResponse = helix_get(client, token, "users", &query).await?;
        users.extend(resp.data);
    }
    Ok(users)
}
