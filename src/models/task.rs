//! Text-processing task kinds and their instruction prefixes.

use serde::{Deserialize, Serialize};

/// Supported text-processing tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Condense the text.
    Summarize,
    /// Rewrite for clarity and structure.
    Rewrite,
    /// Produce a balanced counterargument.
    Counter,
    /// Generate a reflective question about the text.
    Question,
}

impl TaskKind {
    /// Instruction prefix prepended to the user text before generation.
    #[must_use]
    pub fn prompt_prefix(self) -> &'static str {
        match self {
            Self::Summarize => "Summarize the following text concisely and clearly:\n\n",
            Self::Rewrite => {
                "Rewrite the following text, improving its clarity and structure:\n\n"
            }
            Self::Counter => {
                "Provide a balanced counterargument to the following text:\n\n"
            }
            Self::Question => {
                "Generate a thoughtful, interesting question based on the following text:\n\n"
            }
        }
    }

    /// Wire label, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Rewrite => "rewrite",
            Self::Counter => "counter",
            Self::Question => "question",
        }
    }

    /// Parse the wire label back into a task kind.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "summarize" => Some(Self::Summarize),
            "rewrite" => Some(Self::Rewrite),
            "counter" => Some(Self::Counter),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}
