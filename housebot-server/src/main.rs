use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use twilight_gateway::{CloseFrame, Intents, Shard, ShardId};
use twilight_http::client::ClientBuilder;

use housebot_core::monitor::sessions::SessionRegistry;
use housebot_core::platforms::discord::DiscordMessenger;
use housebot_core::platforms::twitch::TwitchHelixClient;
use housebot_core::tasks::spawn_live_monitor_task;
use housebot_core::{LiveMonitor, MonitorConfig};

mod commands;
mod context;
mod gateway;

use context::BotContext;

const DISCORD_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug, Clone)]
#[command(name = "housebot")]
#[command(author, version, about = "HouseBot - Twitch live notifications for Discord")]
struct Args {
    /// Discord bot token.
    #[arg(short = 't', long)]
    token: Option<String>,

    /// File containing the Discord bot token. Used when --token is absent;
    /// falls back to the BOT_TOKEN environment variable.
    #[arg(short = 'p', long)]
    token_path: Option<PathBuf>,

    #[arg(long, env = "TWITCH_CLIENT_ID")]
    twitch_client_id: String,

    #[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    twitch_client_secret: String,

    /// Directory holding session state files.
    #[arg(long, env = "HOUSEBOT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Session name; state is kept in <data-dir>/<session>.json.
    #[arg(long, default_value = "data")]
    session: String,

    /// Seconds between Twitch polls.
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Guild role allowed to manage subscriptions.
    #[arg(long, env = "HOUSEBOT_MOD_ROLE", default_value = "Mod")]
    mod_role: String,

    /// Also write JSON logs to a daily-rotated file in this directory.
    #[arg(long, env = "HOUSEBOT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, short = 'd', default_value = "false")]
    debug: bool,
}

fn init_tracing(debug: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if debug { "housebot=debug" } else { "housebot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    let Some(dir) = log_dir else {
        registry.try_init().context("installing tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "housebot.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().json().with_ansi(false).with_writer(writer))
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(Some(guard))
}

/// `--token` > `--token-path` > `BOT_TOKEN`.
fn resolve_token(args: &Args) -> anyhow::Result<String> {
    let token = if let Some(token) = &args.token {
        token.clone()
    } else if let Some(path) = &args.token_path {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading bot token from {}", path.display()))?
    } else {
        info!("No token flags given; loading the bot token from BOT_TOKEN");
        std::env::var("BOT_TOKEN").unwrap_or_default()
    };

    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("no Discord bot token: pass --token or --token-path, or set BOT_TOKEN");
    }
    Ok(token)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = init_tracing(args.debug, args.log_dir.as_deref())?;

    info!("HouseBot starting. session={}, data_dir={}", args.session, args.data_dir.display());
    run(args).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let token = resolve_token(&args)?;

    let http = Arc::new(
        ClientBuilder::new()
            .token(token.clone())
            .timeout(DISCORD_HTTP_TIMEOUT)
            .build(),
    );
    let helix = Arc::new(TwitchHelixClient::new(&args.twitch_client_id, &args.twitch_client_secret));
    let messenger = Arc::new(DiscordMessenger::new(Arc::clone(&http)));

    let config = MonitorConfig {
        session_name: args.session.clone(),
        data_dir: args.data_dir.clone(),
        poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        ..Default::default()
    };
    let monitor = Arc::new(
        LiveMonitor::open(config, helix, messenger)
            .await
            .context("opening monitor session")?,
    );

    let signal_monitor = Arc::clone(&monitor);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {e}");
                return;
            }
        }
        signal_monitor.close();
    });

    let mut shutdown = monitor.shutdown_receiver();
    if let Err(e) = monitor.credentials().authenticate_with_backoff(&mut shutdown).await {
        info!("Stopped before Twitch authentication completed: {e}");
        return Ok(());
    }

    let sessions = Arc::new(SessionRegistry::new());
    let poll_task = spawn_live_monitor_task(Arc::clone(&monitor), Arc::clone(&sessions));

    let intents = Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT;
    let shard = Shard::new(ShardId::ONE, token, intents);
    let shard_sender = shard.sender();
    let ctx = Arc::new(BotContext::new(
        Arc::clone(&http),
        Arc::clone(&sessions),
        monitor.session_id().to_string(),
        args.mod_role.clone(),
    ));
    let shard_task = tokio::spawn(gateway::run_shard(shard, ctx));

    info!("Bot is now running. Press Ctrl-C to exit.");
    let _ = shutdown.wait_for(|closed| *closed).await;

    info!("Twitch monitor is shutting down.");
    if let Err(e) = poll_task.await {
        warn!("Poll task ended abnormally: {e}");
    }
    match monitor.save().await {
        Ok(()) => info!("Saved monitor state to {}", monitor.config().state_path().display()),
        Err(e) => error!("Failed to save monitor state: {e}"),
    }

    info!("Discord connection is shutting down.");
    if let Err(e) = shard_sender.close(CloseFrame::NORMAL) {
        warn!("Failed to close gateway shard: {e}");
    }
    if let Err(e) = shard_task.await {
        warn!("Shard task ended abnormally: {e}");
    }

    info!("Goodbye!");
    Ok(())
}
