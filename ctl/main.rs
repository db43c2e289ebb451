#![forbid(unsafe_code)]

//! `loomd-ctl` — local CLI companion for `loomd`.
//!
//! Connects to the worker's IPC socket, sends one request envelope, and
//! prints the reply. A frontend like any other: the worker itself has no
//! command-line surface.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "loomd-ctl",
    about = "Local CLI for the loomd worker",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the worker's `ipc_name` config).
    #[arg(long, default_value = "loomd-worker")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read the session phase snapshot.
    Status,

    /// Load a model, or confirm the one already loaded.
    Load {
        /// Model configuration id; the worker default when omitted.
        model: Option<String>,
    },

    /// Drop the loaded model.
    Unload,

    /// Run a text-processing task.
    Run {
        /// Task kind: summarize, rewrite, counter, or question.
        task: String,
        /// Input text.
        text: String,
    },

    /// Summarize with the reduced quick-run budget.
    Quick {
        /// Input text; the worker falls back to the last selection.
        text: Option<String>,
    },

    /// List saved results, newest first.
    List {
        /// Row cap.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Ask whether an inference engine is present.
    Check,

    /// Tail broadcast frames until interrupted.
    Watch,
}

impl Command {
    /// Build the request envelope for this subcommand, or `None` for
    /// watch mode.
    fn envelope(&self) -> Option<serde_json::Value> {
        let (kind, payload) = match self {
            Self::Status => ("get-status", serde_json::json!({})),
            Self::Load { model } => ("load-model", serde_json::json!({ "sessionId": model })),
            Self::Unload => ("unload-model", serde_json::json!({})),
            Self::Run { task, text } => (
                "run-task",
                serde_json::json!({ "text": text, "taskKind": task }),
            ),
            Self::Quick { text } => ("quick-run", serde_json::json!({ "text": text })),
            Self::List { limit } => ("list-results", serde_json::json!({ "limit": limit })),
            Self::Check => ("check-capability", serde_json::json!({})),
            Self::Watch => return None,
        };
        Some(serde_json::json!({ "id": "ctl", "kind": kind, "payload": payload }))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let socket_name = cli.ipc_name.clone().to_ns_name::<GenericNamespaced>()?;
    let stream = Stream::connect(socket_name)
        .map_err(|err| format!("cannot connect to '{}': {err} (is loomd running?)", cli.ipc_name))?;
    let mut reader = BufReader::new(stream);

    match cli.command.envelope() {
        Some(envelope) => {
            let mut request = serde_json::to_string(&envelope)?;
            request.push('\n');
            reader.get_mut().write_all(request.as_bytes())?;

            // Broadcasts may interleave before the reply; print them as
            // they pass and stop at the first reply frame.
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err("connection closed before a reply arrived".into());
                }
                let frame: serde_json::Value = serde_json::from_str(line.trim())?;
                println!("{}", serde_json::to_string_pretty(&frame)?);
                if frame.get("type").and_then(serde_json::Value::as_str) == Some("reply") {
                    break;
                }
            }
        }
        None => {
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    break;
                }
                let frame: serde_json::Value = serde_json::from_str(line.trim())?;
                println!("{}", serde_json::to_string_pretty(&frame)?);
            }
        }
    }

    Ok(())
}
