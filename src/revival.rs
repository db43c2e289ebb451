//! Host-driven revival ticks.
//!
//! The worker never busy-waits to stay resident; the only sanctioned
//! wake-ups are this bounded periodic tick and inbound IPC requests. The
//! host floor on tick intervals is one minute — registrations below it
//! are rejected outright.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::WorkerContext;
use crate::maintenance;
use crate::{Result, WorkerError};

/// Host-enforced minimum tick interval.
pub const MIN_TICK_SECONDS: u64 = 60;

/// Spawn the revival tick task.
///
/// Each tick runs one maintenance pass. The first tick fires
/// immediately, covering the cold-start case.
///
/// # Errors
///
/// Returns `WorkerError::Config` if the configured interval is below the
/// one-minute host floor.
pub fn spawn_revival_task(
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    let tick_seconds = ctx.config.tick_seconds;
    if tick_seconds < MIN_TICK_SECONDS {
        return Err(WorkerError::Config(format!(
            "revival interval {tick_seconds}s is below the host minimum of {MIN_TICK_SECONDS}s"
        )));
    }

    Ok(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds));
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("revival task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    maintenance::run_tick(&ctx).await;
                }
            }
        }
    }))
}
