//! Background task that runs the retention sweep periodically

use crate::service::AuthService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Run [`AuthService::sweep`] every `period` until `shutdown` fires.
///
/// The first sweep runs immediately. Sweep failures are logged and the loop
/// keeps going; the task returns the number of completed sweeps.
pub fn spawn_sweeper(
    service: Arc<AuthService>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        tracing::info!("Starting session sweeper with {:?} interval", period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match service.sweep().await {
                        Ok(_) => completed += 1,
                        Err(e) => tracing::error!("Session sweep failed: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper stopping after {} sweeps", completed);
                    break;
                }
            }
        }

        completed
    })
}
