//! Periodic refresh of alert layers and retry of missing forecast layers.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::server::Session;

/// Run [`Session::refresh`] every `interval` until `shutdown` fires.
///
/// The first refresh happens one interval after start; the initial load is
/// the caller's job.
pub async fn run_forever(session: Session, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Shutting down refresh loop");
                break;
            }
            _ = ticker.tick() => {
                let summary = session.refresh().await;
                info!(
                    event_layers = ?summary.event_layers,
                    newly_impacted = summary.newly_impacted,
                    forecasts_loaded = summary.forecasts.loaded,
                    forecasts_skipped = summary.forecasts.skipped,
                    radars_added = summary.radars_added,
                    "Refresh complete"
                );
            }
        }
    }
}
