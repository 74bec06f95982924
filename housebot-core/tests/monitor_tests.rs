use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use housebot_core::monitor::sessions::SessionRegistry;
use housebot_core::tasks::spawn_live_monitor_task;
use housebot_core::test_utils::{MockMessenger, MockStreamingApi};
use housebot_core::{Error, LiveMonitor, MonitorConfig};

struct Harness {
    api: Arc<MockStreamingApi>,
    messenger: Arc<MockMessenger>,
    monitor: LiveMonitor,
    t0: DateTime<Utc>,
}

impl Harness {
    async fn new() -> Result<Self, Error> {
        let api = Arc::new(MockStreamingApi::new());
        api.add_user("shroud", "shroud");
        let messenger = Arc::new(MockMessenger::new());
        let monitor = LiveMonitor::in_memory(MonitorConfig::default(), api.clone(), messenger.clone());
        monitor.set_community_active("guild1");
        monitor.registry().register("shroud", "guild1", "chanA").await?;
        Ok(Self {
            api,
            messenger,
            monitor,
            t0: Utc::now(),
        })
    }

    /// Runs a cycle `secs` after t0 and waits for its deliveries.
    async fn tick(&self, secs: i64) -> Result<usize, Error> {
        let report = self.monitor.run_cycle(self.t0 + Duration::seconds(secs)).await?;
        let spawned = report.deliveries.len();
        report.wait_for_deliveries().await;
        Ok(spawned)
    }

    async fn channel(&self) -> housebot_common::models::TrackedChannel {
        self.monitor.registry().channel("shroud").await.expect("shroud is tracked")
    }
}

#[tokio::test]
async fn test_live_then_offline_end_to_end() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);

    assert_eq!(h.tick(10).await?, 0, "not confirmed yet");
    assert!(h.messenger.sent().is_empty());

    h.tick(100).await?;
    let sent = h.messenger.sent_to("chanA");
    assert_eq!(sent.len(), 1);
    let title = sent[0].embed.title.clone().unwrap_or_default();
    assert!(title.contains("Valorant"), "title was {title}");

    let channel = h.channel().await;
    assert!(channel.is_live);
    let sub = channel.subscriptions["guild1"]["chanA"].clone();
    assert!(sub.notified);
    assert_eq!(sub.handle, Some(sent[0].handle.clone()));

    h.api.go_offline("shroud");
    assert_eq!(h.tick(200).await?, 0, "offline not confirmed yet");
    assert_eq!(h.channel().await.ended_at, Some(h.t0 + Duration::seconds(200)));

    assert_eq!(h.tick(300).await?, 1);
    let edits = h.messenger.edits();
    let summary = edits.last().expect("summary edit");
    assert_eq!(summary.handle, sent[0].handle);
    assert_eq!(summary.embed.title.as_deref(), Some("shroud was live"));
    let games = summary.embed.field("Games").map(|f| f.value.clone()).unwrap_or_default();
    assert_eq!(games.lines().count(), 1);
    assert_eq!(games, "Valorant: 3m 20s");

    let channel = h.channel().await;
    let sub = &channel.subscriptions["guild1"]["chanA"];
    assert!(!sub.notified);
    assert!(sub.handle.is_none());
    assert!(channel.games.is_empty());
    assert!(!channel.is_live);

    // Nothing further once the session is closed out.
    assert_eq!(h.tick(500).await?, 0);
    assert_eq!(h.messenger.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_short_blip_sends_nothing() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Just Chatting", "testing mic", h.t0);
    h.tick(10).await?;
    h.tick(60).await?;

    h.api.go_offline("shroud");
    h.tick(80).await?;
    h.tick(200).await?;
    h.tick(400).await?;

    assert!(h.messenger.sent().is_empty());
    assert!(h.messenger.edits().is_empty());
    let channel = h.channel().await;
    assert!(!channel.is_live);
    assert!(channel.games.is_empty());
    assert!(channel.pending_game.is_none());
    Ok(())
}

#[tokio::test]
async fn test_blip_history_does_not_reach_next_session() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Just Chatting", "testing mic", h.t0);
    h.tick(10).await?;
    h.api.go_offline("shroud");
    h.tick(60).await?;
    h.tick(400).await?;
    assert!(h.channel().await.games.is_empty());

    let start = h.t0 + Duration::seconds(1000);
    h.api.go_live("shroud", "Valorant", "ranked grind", start);
    h.tick(1010).await?;
    h.tick(1100).await?;
    assert_eq!(h.messenger.sent().len(), 1);

    h.api.go_offline("shroud");
    h.tick(1300).await?;
    assert_eq!(h.tick(1400).await?, 1);

    let edits = h.messenger.edits();
    let summary = &edits.last().expect("summary edit").embed;
    assert_eq!(summary.field("Games").map(|f| f.value.as_str()), Some("Valorant: 5m 00s"));
    assert_eq!(summary.field("Duration").map(|f| f.value.as_str()), Some("5m 00s"));
    let started = format!("<t:{}:f>", start.timestamp());
    assert_eq!(summary.field("Started").map(|f| f.value.as_str()), Some(started.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_blip_followed_quickly_by_new_stream() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Just Chatting", "testing mic", h.t0);
    h.tick(10).await?;
    h.tick(30).await?;
    h.api.go_offline("shroud");
    h.tick(40).await?;

    // Back within the confirmation window, on a new stream.
    let start = h.t0 + Duration::seconds(60);
    h.api.go_live("shroud", "Valorant", "ranked grind", start);
    h.tick(70).await?;
    h.tick(160).await?;
    let channel = h.channel().await;
    assert!(channel.is_live);
    assert_eq!(channel.games.len(), 1);
    assert_eq!(channel.games[0].game, "Valorant");
    assert_eq!(channel.games[0].started_at, start);

    h.api.go_offline("shroud");
    h.tick(300).await?;
    h.tick(400).await?;
    let edits = h.messenger.edits();
    let summary = &edits.last().expect("summary edit").embed;
    assert_eq!(summary.field("Games").map(|f| f.value.as_str()), Some("Valorant: 4m 00s"));
    assert_eq!(summary.field("Duration").map(|f| f.value.as_str()), Some("4m 00s"));
    Ok(())
}

#[tokio::test]
async fn test_post_finishing_after_session_end_gets_summary() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.messenger.hold_sends(true);
    let announce = h.monitor.run_cycle(h.t0 + Duration::seconds(100)).await?;
    assert_eq!(announce.deliveries.len(), 1);

    h.api.go_offline("shroud");
    assert_eq!(h.tick(200).await?, 0);
    assert_eq!(h.tick(300).await?, 0, "no handle to summarize yet");
    assert!(!h.channel().await.is_live);

    h.messenger.hold_sends(false);
    announce.wait_for_deliveries().await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    let edits = h.messenger.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].handle, sent[0].handle);
    assert_eq!(edits[0].embed.title.as_deref(), Some("shroud was live"));
    assert_eq!(edits[0].embed.field("Games").map(|f| f.value.as_str()), Some("Valorant: 3m 20s"));

    let channel = h.channel().await;
    let sub = &channel.subscriptions["guild1"]["chanA"];
    assert!(!sub.notified);
    assert!(sub.handle.is_none());
    Ok(())
}

#[tokio::test]
async fn test_brief_offline_keeps_live_message() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.tick(100).await?;

    h.api.go_offline("shroud");
    h.tick(110).await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.tick(150).await?;

    assert_eq!(h.messenger.sent().len(), 1);
    assert!(h.messenger.edits().iter().all(|e| e.embed.title.as_deref() != Some("shroud was live")));
    let channel = h.channel().await;
    assert!(channel.is_live);
    assert!(channel.ended_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_live_message_refreshes_in_place() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.tick(100).await?;

    assert_eq!(h.tick(120).await?, 0, "too soon to refresh");
    assert_eq!(h.tick(140).await?, 1);

    let edits = h.messenger.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].handle, h.messenger.sent()[0].handle);
    assert_eq!(edits[0].embed.field("Uptime").map(|f| f.value.as_str()), Some("2m 20s"));
    assert_eq!(h.messenger.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_posts_new_message() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.tick(100).await?;

    h.messenger.set_fail_edits(true);
    h.tick(140).await?;
    let sub = h.channel().await.subscriptions["guild1"]["chanA"].clone();
    assert!(!sub.notified);
    assert!(sub.handle.is_none());

    h.messenger.set_fail_edits(false);
    h.tick(150).await?;
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    let sub = h.channel().await.subscriptions["guild1"]["chanA"].clone();
    assert_eq!(sub.handle, Some(sent[1].handle.clone()));
    Ok(())
}

#[tokio::test]
async fn test_failed_send_is_retried() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);

    h.messenger.set_fail_sends(true);
    assert_eq!(h.tick(100).await?, 1);
    assert!(!h.channel().await.subscriptions["guild1"]["chanA"].notified);

    h.messenger.set_fail_sends(false);
    assert_eq!(h.tick(110).await?, 1);
    assert_eq!(h.messenger.sent().len(), 1);
    assert!(h.channel().await.subscriptions["guild1"]["chanA"].handle.is_some());
    Ok(())
}

#[tokio::test]
async fn test_one_message_per_subscription() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.monitor.registry().register("shroud", "guild1", "chanB").await?;
    h.monitor.registry().register("shroud", "guild2", "chanC").await?;
    h.monitor.set_community_active("guild2");
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);

    assert_eq!(h.tick(100).await?, 3);
    assert_eq!(h.tick(110).await?, 0);
    for destination in ["chanA", "chanB", "chanC"] {
        assert_eq!(h.messenger.sent_to(destination).len(), 1, "{destination}");
    }
    Ok(())
}

#[tokio::test]
async fn test_inactive_community_is_skipped() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.monitor.set_community_inactive("guild1");
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);

    assert_eq!(h.tick(100).await?, 0);
    assert!(h.messenger.sent().is_empty());
    let channel = h.channel().await;
    assert!(channel.is_live, "state still tracks the stream");
    assert!(channel.stream.is_some());

    h.monitor.set_community_active("guild1");
    assert_eq!(h.tick(110).await?, 1);
    assert_eq!(h.messenger.sent_to("chanA").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_inactive_community_loses_summary() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.tick(100).await?;

    h.monitor.set_community_inactive("guild1");
    h.api.go_offline("shroud");
    h.tick(200).await?;
    assert_eq!(h.tick(300).await?, 0);

    let channel = h.channel().await;
    assert!(!channel.is_live);
    assert!(!channel.subscriptions["guild1"]["chanA"].notified);
    assert!(h.messenger.edits().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_game_changes_are_coalesced() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "variety", h.t0);
    h.tick(10).await?;

    for (i, secs) in (20..=300).step_by(10).enumerate() {
        h.api.set_game("shroud", if i % 2 == 0 { "Apex Legends" } else { "Valorant" });
        h.tick(secs).await?;
    }

    let games = h.channel().await.games;
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].game, "Valorant");
    Ok(())
}

#[tokio::test]
async fn test_game_switch_after_dwell() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "variety", h.t0);
    h.tick(10).await?;

    h.api.set_game("shroud", "Apex Legends");
    h.tick(100).await?;
    h.tick(130).await?;
    assert_eq!(h.channel().await.games.len(), 1);
    h.tick(160).await?;

    let games = h.channel().await.games;
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].ended_at, Some(h.t0 + Duration::seconds(100)));
    assert_eq!(games[1].game, "Apex Legends");
    assert_eq!(games[1].started_at, h.t0 + Duration::seconds(100));

    h.api.go_offline("shroud");
    h.tick(200).await?;
    h.tick(300).await?;
    let summary = h.messenger.edits().last().cloned().expect("summary");
    assert_eq!(
        summary.embed.field("Games").map(|f| f.value.clone()),
        Some("Valorant: 1m 40s\nApex Legends: 1m 40s".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_skips_cycle() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.api.set_streams_failing(true);

    let result = h.monitor.run_cycle(h.t0 + Duration::seconds(100)).await;
    assert!(matches!(result, Err(Error::Upstream(_))));
    assert!(h.channel().await.stream.is_none());

    h.api.set_streams_failing(false);
    h.tick(110).await?;
    assert_eq!(h.messenger.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_registry_skips_query() -> Result<(), Error> {
    let api = Arc::new(MockStreamingApi::new());
    let monitor = LiveMonitor::in_memory(MonitorConfig::default(), api.clone(), Arc::new(MockMessenger::new()));

    let report = monitor.run_cycle(Utc::now()).await?;
    assert_eq!(report.polled, 0);
    assert_eq!(api.stream_queries.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_stale_profile_refreshed_while_live() -> Result<(), Error> {
    let h = Harness::new().await?;
    h.api.go_live("shroud", "Valorant", "ranked grind", h.t0);
    h.api.rename_user("shroud", "Shroud");

    h.tick(10).await?;
    assert_eq!(h.channel().await.display_name, "shroud", "profile is fresh");

    let two_days = 2 * 24 * 60 * 60;
    h.tick(two_days).await?;
    let channel = h.channel().await;
    assert_eq!(channel.display_name, "Shroud");
    assert_eq!(channel.profile_updated_at, Some(h.t0 + Duration::seconds(two_days)));
    Ok(())
}

#[tokio::test]
async fn test_poll_loop_deregisters_on_close() {
    let api = Arc::new(MockStreamingApi::new());
    let config = MonitorConfig {
        session_name: "loop".into(),
        poll_interval: StdDuration::from_millis(20),
        ..Default::default()
    };
    let monitor = Arc::new(LiveMonitor::in_memory(config, api.clone(), Arc::new(MockMessenger::new())));
    let sessions = Arc::new(SessionRegistry::new());

    let task = spawn_live_monitor_task(Arc::clone(&monitor), Arc::clone(&sessions));
    assert!(sessions.contains("loop"));

    // Events routed by session id reach the running monitor.
    let routed = sessions.get("loop").expect("session is registered");
    assert!(Arc::ptr_eq(&routed, &monitor));
    routed.set_community_active("guild9");
    assert!(monitor.communities().is_active("guild9"));
    drop(routed);

    tokio::time::sleep(StdDuration::from_millis(100)).await;
    monitor.close();
    tokio::time::timeout(StdDuration::from_secs(5), task)
        .await
        .expect("poll loop exits after close")
        .expect("poll loop did not panic");

    assert!(sessions.is_empty());
    assert!(sessions.get("loop").is_none());
    assert!(monitor.is_closed());
    assert!(api.validations.load(Ordering::SeqCst) + api.token_requests.load(Ordering::SeqCst) >= 2);
}
