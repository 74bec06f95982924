// File: housebot-core/src/platforms/twitch/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use twitch_oauth2::{AccessToken, ClientId, ClientSecret};

use crate::Error;
use crate::platforms::twitch::requests::{stream, token, user};
use housebot_common::models::twitch::{AppToken, StreamData, TokenValidation, UserData};
use housebot_common::traits::api::StreamingApi;

/// A small wrapper client for calling the Helix endpoints the monitor needs.
///
/// The request functions themselves live under `requests::*`; this struct is
/// the shared "entry point" carrying the app credentials and one reqwest client.
pub struct TwitchHelixClient {
    http: Arc<ReqwestClient>,
    client_id: ClientId,
    client_secret: ClientSecret,
}

impl TwitchHelixClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self::with_http(Arc::new(ReqwestClient::new()), client_id, client_secret)
    }

    pub fn with_http(http: Arc<ReqwestClient>, client_id: &str, client_secret: &str) -> Self {
        Self {
            http,
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
        }
    }

    /// Expose the client_id for Helix requests that require it.
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.secret()
    }

    /// Returns an `Arc<ReqwestClient>` reference for advanced usage.
    pub fn http_client(&self) -> Arc<ReqwestClient> {
        self.http.clone()
    }
}

#[async_trait]
impl StreamingApi for TwitchHelixClient {
    async fn request_app_token(&self) -> Result<AppToken, Error> {
        token::request_app_token(self).await
    }

    async fn validate_token(&self, access_token: &AccessToken) -> Result<TokenValidation, Error> {
        token::validate_token(self, access_token).await
    }

    async fn get_users(&self, access_token: &AccessToken, logins: &[String]) -> Result<Vec<UserData>, Error> {
        user::fetch_users(self, access_token, logins).await
    }

    async fn get_streams(&self, access_token: &AccessToken, logins: &[String])
                         -> Result<Vec<StreamData>, Error> {
        stream::fetch_streams(self, access_token, logins).await
    }
}
