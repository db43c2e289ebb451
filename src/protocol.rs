//! Wire protocol for frontend connections.
//!
//! Line-delimited JSON over the local IPC socket. Inbound lines carry a
//! request envelope; outbound lines carry either a point reply or a
//! broadcast frame:
//!
//! ```json
//! {"id": "42", "kind": "run-task", "payload": {"text": "...", "taskKind": "summarize"}}
//! {"type": "reply", "id": "42", "ok": true, "data": { ... }}
//! {"type": "broadcast", "kind": "loading-progress", "payload": {"percent": 40, "message": "..."}}
//! ```
//!
//! The request body is a tagged union dispatched exhaustively; a kind
//! outside the table is answered with a structured error, never dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::session::SessionPhase;
use crate::models::task::TaskKind;
use crate::WorkerError;

/// Every request kind the router dispatches, in wire spelling.
pub const REQUEST_KINDS: [&str; 9] = [
    "load-model",
    "run-task",
    "get-status",
    "unload-model",
    "save-result",
    "list-results",
    "check-capability",
    "selection-changed",
    "quick-run",
];

/// Optional sampling overrides accepted by `run-task`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Generation length cap; clamped to the configured budget.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature override.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Nucleus sampling override.
    #[serde(default)]
    pub top_p: Option<f32>,
}

/// Inbound request body, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Load (or confirm) a compute session.
    LoadModel {
        /// Model configuration id; the configured default when omitted.
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Run a text-processing task against the loaded session.
    RunTask {
        /// Input text; must be non-empty.
        text: String,
        /// Task to run.
        task_kind: TaskKind,
        /// Optional sampling overrides.
        #[serde(default)]
        options: Option<RunOptions>,
    },
    /// Read the session phase snapshot.
    GetStatus {},
    /// Drop the loaded session.
    UnloadModel {},
    /// Persist a processed result.
    SaveResult {
        /// Text the task ran over.
        input_text: String,
        /// Generated output.
        result_text: String,
        /// Task that produced the output.
        task_kind: TaskKind,
        /// Originating page or surface, display only.
        #[serde(default)]
        context: Option<String>,
    },
    /// List saved results, newest first.
    ListResults {
        /// Row cap; a server-side default applies when omitted.
        #[serde(default)]
        limit: Option<u32>,
    },
    /// Ask whether an inference capability is present at all.
    CheckCapability {},
    /// Record the most recent text selection for quick-run fallback.
    SelectionChanged {
        /// Selected text.
        text: String,
        /// Originating page or surface.
        #[serde(default)]
        context: Option<String>,
    },
    /// Summarize with the reduced quick-run token budget.
    QuickRun {
        /// Input text; falls back to the last recorded selection.
        #[serde(default)]
        text: Option<String>,
        /// Originating page or surface.
        #[serde(default)]
        context: Option<String>,
    },
}

impl Request {
    /// Wire spelling of this request's kind, for logs and timeout lookup.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoadModel { .. } => "load-model",
            Self::RunTask { .. } => "run-task",
            Self::GetStatus {} => "get-status",
            Self::UnloadModel {} => "unload-model",
            Self::SaveResult { .. } => "save-result",
            Self::ListResults { .. } => "list-results",
            Self::CheckCapability {} => "check-capability",
            Self::SelectionChanged { .. } => "selection-changed",
            Self::QuickRun { .. } => "quick-run",
        }
    }
}

/// Inbound request envelope: optional correlation id plus the tagged body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    /// Correlation id echoed in the reply; absent for fire-and-forget
    /// clients.
    #[serde(default)]
    pub id: Option<String>,
    /// The request body.
    #[serde(flatten)]
    pub request: Request,
}

/// Why an inbound line failed to parse into a [`RequestEnvelope`].
#[derive(Debug)]
pub enum ParseError {
    /// The line carried a `kind` outside the dispatch table.
    UnrecognizedKind {
        /// The unknown kind, echoed in the error reply.
        kind: String,
        /// Correlation id from the envelope, when one was readable.
        id: Option<String>,
    },
    /// The line was not valid JSON or the payload did not match the kind.
    Malformed(String),
}

/// Parse one inbound line into a request envelope.
///
/// A missing `payload` key is treated as an empty payload so bare kinds
/// like `{"kind": "get-status"}` parse cleanly.
///
/// # Errors
///
/// Returns [`ParseError::UnrecognizedKind`] for a kind outside the
/// dispatch table, [`ParseError::Malformed`] for anything else.
pub fn parse_request_line(line: &str) -> std::result::Result<RequestEnvelope, ParseError> {
    let mut value: Value =
        serde_json::from_str(line).map_err(|err| ParseError::Malformed(err.to_string()))?;

    let Some(object) = value.as_object_mut() else {
        return Err(ParseError::Malformed("request must be a JSON object".into()));
    };

    match object.get("kind").and_then(Value::as_str) {
        Some(kind) if REQUEST_KINDS.contains(&kind) => {}
        Some(kind) => {
            let kind = kind.to_owned();
            let id = object
                .get("id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            return Err(ParseError::UnrecognizedKind { kind, id });
        }
        None => return Err(ParseError::Malformed("missing 'kind' field".into())),
    }

    object
        .entry("payload")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));

    serde_json::from_value(value).map_err(|err| ParseError::Malformed(err.to_string()))
}

/// Structured error payload carried in a failed reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Set on generation errors when a `load-model` would help.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_load: Option<bool>,
    /// Set on load errors to the phase the session landed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<SessionPhase>,
}

impl ErrorBody {
    /// Build the base error body for a worker error.
    #[must_use]
    pub fn from_error(err: &WorkerError) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.to_string(),
            needs_load: None,
            phase: None,
        }
    }
}

/// A point reply to exactly one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Correlation id from the request envelope, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the request succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Structured error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    /// Successful reply carrying `data`.
    #[must_use]
    pub fn success(id: Option<String>, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed reply carrying a structured error.
    #[must_use]
    pub fn failure(id: Option<String>, error: ErrorBody) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

/// One-to-many, best-effort, no-reply-expected notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Broadcast {
    /// Load progress, throttled to whole percent points.
    LoadingProgress {
        /// Completed percentage, 0-100.
        percent: u8,
        /// Capability-provided progress text.
        message: String,
    },
    /// A session finished loading.
    Loaded {
        /// The loaded model configuration id.
        session_id: String,
    },
    /// The session was dropped.
    Unloaded {},
    /// A load attempt failed.
    LoadingError {
        /// Human-readable failure description.
        message: String,
    },
    /// Periodic activity indicator.
    StatusSnapshot {
        /// Current phase.
        phase: SessionPhase,
        /// Current model configuration id, when one is selected.
        session_id: Option<String>,
    },
}

/// Outbound frame: a reply or a broadcast, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Point reply to one request.
    Reply(Reply),
    /// Fan-out notification.
    Broadcast(Broadcast),
}
