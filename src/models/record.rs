//! Saved result records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::task::TaskKind;

/// A processed-text result saved by a frontend.
///
/// Append-only: created by `save-result`, removed by retention pruning,
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Unique record identifier.
    pub id: String,
    /// Text the task ran over.
    pub input_text: String,
    /// Generated output.
    pub output_text: String,
    /// Task that produced the output.
    pub task_kind: TaskKind,
    /// Model session the output came from, when one was loaded.
    pub session_id: Option<String>,
    /// Creation timestamp. Serialized as `timestamp` on the wire.
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Where the input came from (page URL or similar), display only.
    pub source_context: Option<String>,
}

impl ResultRecord {
    /// Construct a new record with a generated identifier, stamped now.
    #[must_use]
    pub fn new(
        input_text: String,
        output_text: String,
        task_kind: TaskKind,
        session_id: Option<String>,
        source_context: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input_text,
            output_text,
            task_kind,
            session_id,
            created_at: Utc::now(),
            source_context,
        }
    }
}
