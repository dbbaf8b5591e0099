use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::trigger::SnapshotTrigger;

/// Runs a snapshot every `period`, starting immediately
pub async fn run_scheduler(trigger: Arc<dyn SnapshotTrigger>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        tracing::trace!("running scheduled gauge history snapshot");

        match trigger.trigger().await {
            Ok(report) => tracing::info!(
                "scheduled snapshot recorded {} gauges for epoch {}",
                report.gauges_processed,
                report.epoch_start
            ),
            Err(e) => tracing::error!("scheduled snapshot failed: {}", e),
        }
    }
}
