use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::Error;
use crate::monitor::LiveMonitor;
use crate::monitor::sessions::SessionRegistry;

/// Registers `monitor` in `sessions` and spawns its poll loop. The loop
/// removes the session again when it exits.
pub fn spawn_live_monitor_task(
    monitor: Arc<LiveMonitor>,
    sessions: Arc<SessionRegistry>,
) -> JoinHandle<()> {
    sessions.insert(Arc::clone(&monitor));
    tokio::spawn(async move {
        run_poll_loop(&monitor).await;
        sessions.remove(monitor.session_id());
    })
}

/// Polls until the session is closed. Cycles never overlap; a closed session
/// interrupts the sleep between them.
pub async fn run_poll_loop(monitor: &LiveMonitor) {
    let mut shutdown = monitor.shutdown_receiver();
    let interval = monitor.config().poll_interval;
    info!(session = monitor.session_id(), "Live monitor started; polling every {:?}", interval);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match monitor.run_cycle(Utc::now()).await {
            Ok(report) => {
                trace!(
                    polled = report.polled,
                    live = report.live,
                    deliveries = report.deliveries.len(),
                    "Poll cycle complete"
                );
            }
            Err(Error::Credential(msg)) => {
                warn!("Skipping poll cycle: Twitch credentials unavailable ({msg})");
            }
            Err(e) => {
                warn!(error = %e, "Poll cycle failed");
            }
        }

        tokio::select! {
            _ = sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("Shutdown sender dropped");
                    break;
                }
            }
        }
    }

    info!(session = monitor.session_id(), "Live monitor stopped");
}
