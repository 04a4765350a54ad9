//! Background sweep task for abandoned sessions.
//!
//! Runs periodically to release closed transports and delete sessions
//! nobody is bound to any more.

use crate::config::SweepConfig;
use crate::server::DropRelay;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Spawn the background sweep task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_sweep_task(relay: Arc<DropRelay>, config: SweepConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Sweep task disabled");
            return;
        }

        tracing::info!("Sweep task started (interval: {:?})", config.interval());

        let mut timer = interval(config.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            let report = relay.sweep().await;
            if report.deleted > 0 || report.released > 0 {
                tracing::info!(
                    "Sweep: released {} stale role(s), deleted {} session(s) ({} idle)",
                    report.released,
                    report.deleted,
                    report.expired
                );
            } else {
                tracing::debug!("Sweep: nothing to do");
            }
            relay.rate_limits().shrink();
        }
    })
}
