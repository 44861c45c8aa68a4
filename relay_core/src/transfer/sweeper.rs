use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::TransferService;

/// Runs [`TransferService::sweep_expired`] every `period` until `shutdown`
/// is cancelled. The first pass runs immediately.
pub fn spawn_sweeper(
    service: TransferService,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            period_secs = period.as_secs(),
            retention_secs = service.retention().as_secs(),
            "Started share sweeper"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Share sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    match service.sweep_expired().await {
                        Ok(report) if report.is_empty() => debug!("Sweep found nothing to reclaim"),
                        Ok(report) => info!(
                            expired = report.expired_entries,
                            stale_leases = report.stale_leases,
                            files = report.files_removed,
                            orphans = report.orphans_removed,
                            active = service.registry().len(),
                            "Sweep reclaimed expired shares"
                        ),
                        Err(e) => error!("Sweep failed: {}", e),
                    }
                }
            }
        }
    })
}
