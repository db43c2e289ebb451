//! Maintenance tick tests: reconcile, prune, refresh — independently.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use loomd::maintenance;
use loomd::models::record::ResultRecord;
use loomd::models::session::SessionPhase;
use loomd::models::task::TaskKind;
use loomd::protocol::{Broadcast, ServerFrame};

use super::test_helpers::{memory_ctx, next_frame, probe, FakeCapability};

fn aged_record(days_ago: i64) -> ResultRecord {
    ResultRecord {
        id: Uuid::new_v4().to_string(),
        input_text: "old".into(),
        output_text: "older".into(),
        task_kind: TaskKind::Summarize,
        session_id: None,
        created_at: Utc::now() - Duration::days(days_ago),
        source_context: None,
    }
}

#[tokio::test]
async fn tick_broadcasts_a_status_snapshot() {
    let ctx = memory_ctx(Arc::new(FakeCapability::ready())).await;
    let mut rx = probe(&ctx).await;

    maintenance::run_tick(&ctx).await;

    let frame = next_frame(&mut rx).await;
    match frame {
        ServerFrame::Broadcast(Broadcast::StatusSnapshot { phase, session_id }) => {
            assert_eq!(phase, SessionPhase::Unloaded);
            assert!(session_id.is_none());
        }
        other => panic!("expected status snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn tick_prunes_aged_results() {
    let ctx = memory_ctx(Arc::new(FakeCapability::ready())).await;

    ctx.result_repo
        .insert(&aged_record(45))
        .await
        .expect("insert aged");
    ctx.result_repo
        .insert(&aged_record(1))
        .await
        .expect("insert fresh");

    maintenance::run_tick(&ctx).await;

    let remaining = ctx.result_repo.list(None).await.expect("list");
    assert_eq!(remaining.len(), 1, "only the fresh record survives");
}

#[tokio::test]
async fn tick_heals_an_orphaned_ready_before_reporting_status() {
    let ctx = memory_ctx(Arc::new(FakeCapability::ready())).await;
    ctx.session
        .adopt_restored(SessionPhase::Ready, Some("tinyllama-1.1b-chat-q4".into()))
        .await;
    let mut rx = probe(&ctx).await;

    maintenance::run_tick(&ctx).await;

    // The snapshot reflects the healed state, not the anomaly.
    let frame = next_frame(&mut rx).await;
    match frame {
        ServerFrame::Broadcast(Broadcast::StatusSnapshot { phase, .. }) => {
            assert_eq!(phase, SessionPhase::Unloaded);
        }
        other => panic!("expected status snapshot, got {other:?}"),
    }

    let persisted = ctx.state_repo.get().await.expect("get").expect("record");
    assert_eq!(persisted.phase, SessionPhase::Unloaded);
}
