//! Per-tick maintenance: reconcile, prune, refresh.
//!
//! The sub-steps are independent; a failure in one is logged and must
//! not prevent the others from running.

use tracing::{debug, error, info};

use crate::context::WorkerContext;
use crate::protocol::Broadcast;
use crate::reconciler;

/// Run one maintenance pass. Never fails; failures are reported, not
/// escalated.
pub async fn run_tick(ctx: &WorkerContext) {
    match reconciler::sync(&ctx.session).await {
        Ok(true) => info!("reconciler downgraded an orphaned ready session"),
        Ok(false) => {}
        Err(err) => error!(%err, "state sync failed"),
    }

    match ctx
        .result_repo
        .prune(
            ctx.config.retention.max_age_days,
            ctx.config.retention.max_count,
        )
        .await
    {
        Ok(outcome) if outcome.aged_out > 0 || outcome.trimmed > 0 => {
            info!(
                aged_out = outcome.aged_out,
                trimmed = outcome.trimmed,
                "retention prune completed"
            );
        }
        Ok(_) => debug!("retention prune found nothing to remove"),
        Err(err) => error!(%err, "retention prune failed"),
    }

    let status = ctx.session.status().await;
    let attempted = ctx
        .connections
        .broadcast(Broadcast::StatusSnapshot {
            phase: status.phase,
            session_id: status.session_id,
        })
        .await;
    debug!(connections = attempted, "status snapshot broadcast");
}
