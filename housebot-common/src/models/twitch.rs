use chrono::{DateTime, Utc};
use serde::Deserialize;
use twitch_oauth2::AccessToken;

/// Response from "Get Streams" endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamsResponse {
    pub data: Vec<StreamData>,
}

/// Single stream data record.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(rename = "type")]
    pub type_field: String, // "live", or "" when something went wrong upstream
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub thumbnail_url: String,
}

impl StreamData {
    pub fn is_live(&self) -> bool {
        self.type_field == "live"
    }
}

/// Response from "Get Users" endpoint.
#[derive(Debug, Deserialize)]
pub struct UsersResponse {
    pub data: Vec<UserData>,
}

/// Single user record.
#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

/// App access token from the client-credentials flow.
#[derive(Debug, Clone)]
pub struct AppToken {
    pub access_token: AccessToken,
    pub expires_in: u64,
}

/// Result of `GET /oauth2/validate`; `status` is the raw HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidation {
    pub valid: bool,
    pub status: u16,
}

impl TokenValidation {
    pub const STATUS_INVALID: u16 = 401;

    pub fn is_invalid(&self) -> bool {
        self.status == Self::STATUS_INVALID
    }
}
