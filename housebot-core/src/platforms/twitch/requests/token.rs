// App access token helpers: client-credentials grant and /validate.

use serde::Deserialize;
use tracing::debug;
use twitch_oauth2::AccessToken;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;
use housebot_common::models::twitch::{AppToken, TokenValidation};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";

/// Matches Twitch's JSON from the token endpoint
#[derive(Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    expires_in: u64,
    #[allow(dead_code)]
    token_type: String, // "bearer"
}

/// Requests an app access token with the client-credentials grant.
pub async fn request_app_token(client: &TwitchHelixClient) -> Result<AppToken, Error> {
    let params = [
        ("client_id",     client.client_id().to_string()),
        ("client_secret", client.client_secret().to_string()),
        ("grant_type",    "client_credentials".to_string()),
    ];

    let resp = client
        .http_client()
        .post(TOKEN_URL)
        .form(&params)
        .send()
        .await
        .map_err(|e| Error::Credential(format!("HTTP error requesting app token: {e}")))?
        .error_for_status()
        .map_err(|e| Error::Credential(format!("Twitch token endpoint error: {e}")))?
        .json::<TwitchTokenResponse>()
        .await
        .map_err(|e| Error::Credential(format!("Parse error on token JSON: {e}")))?;

    debug!("Obtained Twitch app token; expires in {} s", resp.expires_in);
    Ok(AppToken {
        access_token: AccessToken::new(resp.access_token),
        expires_in: resp.expires_in,
    })
}

/// Calls `/oauth2/validate`. Only transport failures are errors; the HTTP
/// status is handed back so the caller can tell "invalid" (401) from a
/// transient upstream problem.
pub async fn validate_token(
    client: &TwitchHelixClient,
    token: &AccessToken,
) -> Result<TokenValidation, Error> {
    let resp = client
        .http_client()
        .get(VALIDATE_URL)
        .header("Authorization", format!("OAuth {}", token.secret()))
        .send()
        .await
        .map_err(|e| Error::Credential(format!("HTTP error validating token: {e}")))?;

    let status = resp.status();
    Ok(TokenValidation {
        valid: status.is_success(),
        status: status.as_u16(),
    })
}
