//! Request dispatch: one typed envelope in, exactly one reply out.
//!
//! Every request resolves to a reply payload, a structured error, or a
//! timeout — never silence, never a duplicate. Compute-bound kinds carry
//! a reply ceiling; a ceiling expiring releases the requester but does
//! not cancel a detached load, whose outcome still reaches frontends via
//! broadcast.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::{Selection, WorkerContext};
use crate::models::record::ResultRecord;
use crate::models::session::SessionPhase;
use crate::models::task::TaskKind;
use crate::protocol::{ErrorBody, Reply, Request, RequestEnvelope};
use crate::session::LoadStarted;
use crate::{Result, WorkerError};

/// Bookkeeping entry for a request awaiting its single outcome.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Correlation id (client-provided or generated).
    pub request_id: String,
    /// Wire spelling of the request kind.
    pub kind: &'static str,
    /// Receipt timestamp.
    pub issued_at: DateTime<Utc>,
}

/// Reply ceiling for the given kind, when one applies.
fn reply_ceiling(ctx: &WorkerContext, kind: &str) -> Option<Duration> {
    match kind {
        "load-model" => Some(Duration::from_secs(ctx.config.timeouts.load_seconds)),
        "run-task" | "quick-run" => {
            Some(Duration::from_secs(ctx.config.timeouts.generate_seconds))
        }
        _ => None,
    }
}

/// Handle one request envelope, producing exactly one reply.
pub async fn handle_request(ctx: &Arc<WorkerContext>, envelope: RequestEnvelope) -> Reply {
    let kind = envelope.request.kind();
    let request_id = envelope
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!("request", request_id = %request_id, kind);
    async {
        {
            let mut pending = ctx.pending.lock().await;
            pending.insert(
                request_id.clone(),
                PendingRequest {
                    request_id: request_id.clone(),
                    kind,
                    issued_at: Utc::now(),
                },
            );
        }

        let outcome = match reply_ceiling(ctx, kind) {
            Some(ceiling) => {
                match tokio::time::timeout(ceiling, dispatch(ctx, envelope.request)).await {
                    Ok(result) => result,
                    Err(_) => Err(WorkerError::Timeout(format!(
                        "no reply within {}s",
                        ceiling.as_secs()
                    ))),
                }
            }
            None => dispatch(ctx, envelope.request).await,
        };

        let tracked = ctx.pending.lock().await.remove(&request_id);
        if let (Some(entry), Err(WorkerError::Timeout(_))) = (&tracked, &outcome) {
            let waited = Utc::now().signed_duration_since(entry.issued_at);
            warn!(waited_ms = waited.num_milliseconds(), "request timed out");
        }

        match outcome {
            Ok(data) => Reply::success(envelope.id, data),
            Err(err) => {
                debug!(%err, "request failed");
                Reply::failure(envelope.id, decorate_error(kind, &err))
            }
        }
    }
    .instrument(span)
    .await
}

/// Attach kind-specific hints to the base error body.
fn decorate_error(kind: &str, err: &WorkerError) -> ErrorBody {
    let mut body = ErrorBody::from_error(err);
    match (kind, err) {
        ("run-task" | "quick-run", WorkerError::NotReady(_)) => {
            body.needs_load = Some(true);
        }
        ("load-model", WorkerError::Capability(_)) => {
            body.phase = Some(SessionPhase::Error);
        }
        _ => {}
    }
    body
}

/// Exhaustive dispatch by request kind.
async fn dispatch(ctx: &Arc<WorkerContext>, request: Request) -> Result<Value> {
    match request {
        Request::LoadModel { session_id } => handle_load_model(ctx, session_id).await,
        Request::RunTask {
            text,
            task_kind,
            options,
        } => {
            let output = ctx.session.run(&text, task_kind, options, false).await?;
            Ok(run_reply(&output))
        }
        Request::GetStatus {} => handle_get_status(ctx).await,
        Request::UnloadModel {} => {
            ctx.session.unload().await?;
            Ok(json!({ "ok": true }))
        }
        Request::SaveResult {
            input_text,
            result_text,
            task_kind,
            context,
        } => handle_save_result(ctx, input_text, result_text, task_kind, context).await,
        Request::ListResults { limit } => {
            let results = ctx.result_repo.list(limit).await?;
            Ok(json!({ "results": results }))
        }
        Request::CheckCapability {} => Ok(json!({ "supported": ctx.session.has_capability() })),
        Request::SelectionChanged { text, context } => handle_selection(ctx, text, context).await,
        Request::QuickRun { text, context } => handle_quick_run(ctx, text, context).await,
    }
}

async fn handle_load_model(ctx: &Arc<WorkerContext>, session_id: Option<String>) -> Result<Value> {
    match ctx.session.begin_load(session_id).await? {
        LoadStarted::AlreadyReady(session_id) => Ok(json!({
            "sessionId": session_id,
            "phase": "ready",
        })),
        LoadStarted::Started { done, .. } => {
            let session_id = done.await.map_err(|_| {
                WorkerError::Capability("load task aborted before completion".into())
            })??;
            Ok(json!({
                "sessionId": session_id,
                "phase": "ready",
            }))
        }
    }
}

async fn handle_get_status(ctx: &Arc<WorkerContext>) -> Result<Value> {
    let status = ctx.session.status().await;
    Ok(json!({
        "phase": status.phase.as_str(),
        "sessionId": status.session_id,
        "hasCapability": ctx.session.has_capability(),
        "progress": status.progress_percent,
        "models": ctx.config.models,
    }))
}

async fn handle_save_result(
    ctx: &Arc<WorkerContext>,
    input_text: String,
    result_text: String,
    task_kind: TaskKind,
    context: Option<String>,
) -> Result<Value> {
    if input_text.trim().is_empty() || result_text.trim().is_empty() {
        return Err(WorkerError::InvalidInput(
            "inputText and resultText must be non-empty".into(),
        ));
    }

    let session_id = ctx.session.status().await.session_id;
    let record = ResultRecord::new(input_text, result_text, task_kind, session_id, context);
    ctx.result_repo.insert(&record).await?;

    debug!(record_id = %record.id, "result saved");
    Ok(json!({ "id": record.id }))
}

async fn handle_selection(
    ctx: &Arc<WorkerContext>,
    text: String,
    context: Option<String>,
) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(WorkerError::InvalidInput("selection text is empty".into()));
    }

    debug!(
        chars = text.chars().count(),
        context = context.as_deref(),
        "selection recorded"
    );
    let mut last = ctx.last_selection.lock().await;
    *last = Some(Selection { text, context });
    Ok(json!({}))
}

async fn handle_quick_run(
    ctx: &Arc<WorkerContext>,
    text: Option<String>,
    _context: Option<String>,
) -> Result<Value> {
    let text = match text.filter(|t| !t.trim().is_empty()) {
        Some(text) => text,
        None => {
            let last = ctx.last_selection.lock().await;
            last.as_ref()
                .map(|selection| selection.text.clone())
                .ok_or_else(|| WorkerError::InvalidInput("no text provided".into()))?
        }
    };

    let output = ctx
        .session
        .run(&text, TaskKind::Summarize, None, true)
        .await?;
    Ok(run_reply(&output))
}

fn run_reply(output: &crate::session::RunOutput) -> Value {
    json!({
        "resultText": output.result_text,
        "taskKind": output.task_kind.as_str(),
        "sessionId": output.session_id,
        "timestamp": output.timestamp.to_rfc3339(),
    })
}
