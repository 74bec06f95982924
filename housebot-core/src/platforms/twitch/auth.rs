// File: housebot-core/src/platforms/twitch/auth.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use twitch_oauth2::AccessToken;

use crate::Error;
use housebot_common::traits::api::StreamingApi;

const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Owns the app access token used for every Helix call.
///
/// The poll loop and registration calls both go through `ensure_valid`; the
/// token slot is held across validate/refresh so only one refresh is in
/// flight and everyone else picks up its result.
pub struct CredentialManager {
    api: Arc<dyn StreamingApi>,
    token: Mutex<Option<AccessToken>>,
}

impl CredentialManager {
    pub fn new(api: Arc<dyn StreamingApi>) -> Self {
        Self {
            api,
            token: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &Arc<dyn StreamingApi> {
        &self.api
    }

    /// Unconditionally requests a fresh app token and caches it.
    pub async fn authenticate(&self) -> Result<AccessToken, Error> {
        let mut slot = self.token.lock().await;
        self.refresh_locked(&mut slot).await
    }

    async fn refresh_locked(&self, slot: &mut Option<AccessToken>) -> Result<AccessToken, Error> {
        *slot = None;
        let app_token = self
            .api
            .request_app_token()
            .await
            .map_err(|e| match e {
                Error::Credential(_) => e,
                other => Error::Credential(other.to_string()),
            })?;

        if app_token.access_token.secret().is_empty() {
            return Err(Error::Credential("access token retrieved is empty".into()));
        }

        info!("Obtained Twitch app access token (expires in {} s)", app_token.expires_in);
        *slot = Some(app_token.access_token.clone());
        Ok(app_token.access_token)
    }

    /// Returns a token that Twitch just confirmed, refreshing it first if
    /// Twitch says it is invalid.
    ///
    /// A validation status other than success or 401 is a transient failure:
    /// it is logged and returned as `Error::Credential` without touching the
    /// cached token.
    pub async fn ensure_valid(&self) -> Result<AccessToken, Error> {
        let mut slot = self.token.lock().await;
        let Some(token) = slot.clone() else {
            debug!("No Twitch app token cached; authenticating");
            return self.refresh_locked(&mut slot).await;
        };

        let validation = self
            .api
            .validate_token(&token)
            .await
            .map_err(|e| Error::Credential(format!("token validation failed: {e}")))?;

        if validation.valid {
            return Ok(token);
        }
        if validation.is_invalid() {
            warn!("Twitch app token is no longer valid; requesting a new one");
            return self.refresh_locked(&mut slot).await;
        }

        warn!(status = validation.status, "Twitch token validation returned an unexpected status");
        Err(Error::Credential(format!(
            "token validation returned status {}",
            validation.status
        )))
    }

    /// Forgets the cached token, e.g. after Helix answered 401.
    pub async fn invalidate(&self) {
        let mut slot = self.token.lock().await;
        if slot.take().is_some() {
            debug!("Dropped cached Twitch app token");
        }
    }

    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// Retries `authenticate` with exponential backoff (1 s doubling up to
    /// 60 s) until it succeeds or `shutdown` flips to true.
    pub async fn authenticate_with_backoff(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<AccessToken, Error> {
        let mut delay = BACKOFF_START;
        loop {
            if *shutdown.borrow() {
                return Err(Error::Credential("shut down before a token was obtained".into()));
            }
            match self.authenticate().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    warn!(error = %e, "Twitch authentication failed; retrying in {:?}", delay);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Err(Error::Credential("shutdown signal dropped".into()));
                    }
                }
            }
            delay = (delay * 2).min(BACKOFF_MAX);
        }
    }
}
