use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use twitch_oauth2::AccessToken;

use crate::Error;
use housebot_common::models::discord::DiscordEmbed;
use housebot_common::models::twitch::{AppToken, StreamData, TokenValidation, UserData};
use housebot_common::models::{normalize_login, MessageHandle};
use housebot_common::traits::api::{MessagingClient, StreamingApi};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fake Twitch: a user directory plus whatever streams are "live".
#[derive(Default)]
pub struct MockStreamingApi {
    users: Mutex<HashMap<String, UserData>>,
    live: Mutex<HashMap<String, StreamData>>,
    /// Statuses returned by successive `validate_token` calls; empty means 200.
    validation_statuses: Mutex<VecDeque<u16>>,
    /// Returns an empty access token when set.
    empty_token: AtomicBool,
    streams_failing: AtomicBool,
    streams_unauthorized: AtomicBool,

    pub token_requests: AtomicUsize,
    pub validations: AtomicUsize,
    pub user_lookups: AtomicUsize,
    pub stream_queries: AtomicUsize,
}

impl MockStreamingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, login: &str, display_name: &str) {
        let login = normalize_login(login);
        lock(&self.users).insert(
            login.clone(),
            UserData {
                id: format!("id-{login}"),
                login: login.clone(),
                display_name: display_name.to_string(),
                profile_image_url: format!("https://static-cdn.jtvnw.net/{login}-profile.png"),
            },
        );
    }

    pub fn rename_user(&self, login: &str, display_name: &str) {
        if let Some(user) = lock(&self.users).get_mut(&normalize_login(login)) {
            user.display_name = display_name.to_string();
        }
    }

    pub fn go_live(&self, login: &str, game: &str, title: &str, started_at: DateTime<Utc>) {
        let login = normalize_login(login);
        lock(&self.live).insert(
            login.clone(),
            StreamData {
                id: format!("stream-{login}"),
                user_id: format!("id-{login}"),
                user_login: login.clone(),
                user_name: login.clone(),
                game_id: String::new(),
                game_name: game.to_string(),
                type_field: "live".to_string(),
                title: title.to_string(),
                viewer_count: 1234,
                started_at,
                thumbnail_url: format!(
                    "https://static-cdn.jtvnw.net/previews-ttv/live_user_{login}-{{width}}x{{height}}.jpg"
                ),
            },
        );
    }

    pub fn set_game(&self, login: &str, game: &str) {
        if let Some(stream) = lock(&self.live).get_mut(&normalize_login(login)) {
            stream.game_name = game.to_string();
        }
    }

    pub fn go_offline(&self, login: &str) {
        lock(&self.live).remove(&normalize_login(login));
    }

    pub fn push_validation_status(&self, status: u16) {
        lock(&self.validation_statuses).push_back(status);
    }

    pub fn set_empty_token(&self, empty: bool) {
        self.empty_token.store(empty, Ordering::SeqCst);
    }

    pub fn set_streams_failing(&self, failing: bool) {
        self.streams_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_streams_unauthorized(&self, unauthorized: bool) {
        self.streams_unauthorized.store(unauthorized, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamingApi for MockStreamingApi {
    async fn request_app_token(&self) -> Result<AppToken, Error> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let secret = if self.empty_token.load(Ordering::SeqCst) {
            String::new()
        } else {
            format!("mock-token-{n}")
        };
        Ok(AppToken {
            access_token: AccessToken::new(secret),
            expires_in: 3600,
        })
    }

    async fn validate_token(&self, _token: &AccessToken) -> Result<TokenValidation, Error> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        let status = lock(&self.validation_statuses).pop_front().unwrap_or(200);
        Ok(TokenValidation {
            valid: (200..300).contains(&status),
            status,
        })
    }

    async fn get_users(&self, _token: &AccessToken, logins: &[String]) -> Result<Vec<UserData>, Error> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        let users = lock(&self.users);
        Ok(logins
            .iter()
            .filter_map(|login| users.get(&normalize_login(login)).cloned())
            .collect())
    }

    async fn get_streams(&self, _token: &AccessToken, logins: &[String]) -> Result<Vec<StreamData>, Error> {
        self.stream_queries.fetch_add(1, Ordering::SeqCst);
        if self.streams_unauthorized.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized("Get Streams returned 401".into()));
        }
        if self.streams_failing.load(Ordering::SeqCst) {
            return Err(Error::Upstream("Get Streams returned 503".into()));
        }
        let live = lock(&self.live);
        Ok(logins
            .iter()
            .filter_map(|login| live.get(&normalize_login(login)).cloned())
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub destination: String,
    pub handle: MessageHandle,
    pub embed: DiscordEmbed,
}

/// Fake Discord that records every post and edit.
pub struct MockMessenger {
    next_id: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
    /// While true, posts block before reaching "Discord".
    sends_held: watch::Sender<bool>,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
            sends_held: watch::channel(false).0,
        }
    }
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds every post in flight until released.
    pub fn hold_sends(&self, held: bool) {
        self.sends_held.send_replace(held);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn edits(&self) -> Vec<SentMessage> {
        lock(&self.edits).clone()
    }

    pub fn sent_to(&self, destination: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.destination == destination)
            .collect()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingClient for MockMessenger {
    async fn send_embed(&self, destination: &str, embed: &DiscordEmbed) -> Result<MessageHandle, Error> {
        let mut held = self.sends_held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Delivery(format!("send to {destination} rejected")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = MessageHandle(format!("msg-{id}"));
        lock(&self.sent).push(SentMessage {
            destination: destination.to_string(),
            handle: handle.clone(),
            embed: embed.clone(),
        });
        Ok(handle)
    }

    async fn edit_embed(
        &self,
        destination: &str,
        handle: &MessageHandle,
        embed: &DiscordEmbed,
    ) -> Result<(), Error> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(Error::Delivery(format!("edit of {handle} rejected")));
        }
        lock(&self.edits).push(SentMessage {
            destination: destination.to_string(),
            handle: handle.clone(),
            embed: embed.clone(),
        });
        Ok(())
    }
}
