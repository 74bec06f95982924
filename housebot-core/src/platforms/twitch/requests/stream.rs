// ========================================================
// File: housebot-core/src/platforms/twitch/requests/stream.rs
// ========================================================
use tracing::debug;
use twitch_oauth2::AccessToken;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;
use crate::platforms::twitch::requests::{helix_get, HELIX_BATCH_LIMIT};
use housebot_common::models::twitch::{StreamData, StreamsResponse};

/// Fetches the live streams among `logins` via "Get Streams".
///
/// One request per hundred logins; offline channels are simply absent from
/// the result.
pub async fn fetch_streams(
    client: &TwitchHelixClient,
    token: &AccessToken,
    logins: &[String],
) -> Result<Vec<StreamData>, Error> {
    let mut streams = Vec::new();

    for batch in logins.chunks(HELIX_BATCH_LIMIT) {
        let mut query: Vec<(&str, &str)> =
            batch.iter().map(|login| ("user_login", login.as_str())).collect();
        // Default page size is 20.
        query.push(("first", "100"));

        let resp: StreamsResponse = helix_get(client, token, "streams", &query).await?;
        streams.extend(resp.data);
    }

    debug!("Get Streams: {} of {} channel(s) live", streams.len(), logins.len());
    Ok(streams)
}
