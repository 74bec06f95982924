pub mod stream;
pub mod token;
pub mod user;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use twitch_oauth2::AccessToken;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;

pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Helix accepts at most this many `login` / `user_login` parameters per call.
pub const HELIX_BATCH_LIMIT: usize = 100;

/// GET a Helix endpoint with app-token auth and decode its JSON body.
///
/// A 401 is surfaced as `Error::Unauthorized` so callers can drop the cached
/// token; every other failure is `Error::Upstream`.
pub(crate) async fn helix_get<T: DeserializeOwned>(
    client: &TwitchHelixClient,
    token: &AccessToken,
    endpoint: &str,
    query: &[(&str, &str)],
) -> Result<T, Error> {
    let url = format!("{}/{}", HELIX_BASE_URL, endpoint);
    let resp = client
        .http_client()
        .get(&url)
        .query(query)
        .header("Client-Id", client.client_id())
        .header("Authorization", format!("Bearer {}", token.secret()))
        .send()
        .await
        .map_err(|e| Error::Upstream(format!("{} network error: {}", endpoint, e)))?;

    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized(format!("{}: HTTP {}", endpoint, status)));
    }
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(Error::Upstream(format!(
            "{}: HTTP {} => {}",
            endpoint, status, body_text
        )));
    }

    let body = resp.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| Error::Upstream(format!("{} parse error: {}", endpoint, e)))
}
