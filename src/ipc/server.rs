//! Local IPC server for frontend connections.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON request
//! envelopes from any number of frontends and routes them through the
//! message router. Each connection registers in the broadcast registry
//! on accept and is removed on disconnect.
//!
//! Inbound requests also serve as host wake-ups: a suspended worker is
//! revived to service them, which is why no handler may assume state
//! from before the previous suspension.

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::context::WorkerContext;
use crate::protocol::{parse_request_line, ErrorBody, ParseError, Reply, ServerFrame};
use crate::router;
use crate::{Result, WorkerError};

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `WorkerError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    ctx: Arc<WorkerContext>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = ctx.config.ipc_name.clone();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| WorkerError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| WorkerError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                let ctx = Arc::clone(&ctx);
                                tokio::spawn(handle_connection(stream, ctx));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Handle a single frontend connection.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    ctx: Arc<WorkerContext>,
) {
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let connection_id = ctx.connections.register(frame_tx.clone()).await;

    let span = info_span!("ipc_conn", connection_id = %connection_id);
    async move {
        let (reader, mut writer) = stream.split();

        // Replies and broadcasts share one writer task so frames never
        // interleave on the socket.
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let mut line = match serde_json::to_string(&frame) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(%err, "failed to serialize outbound frame");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(err) = writer.write_all(line.as_bytes()).await {
                    warn!(%err, "failed to write outbound frame");
                    break;
                }
            }
        });

        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_request_line(trimmed) {
                        Ok(envelope) => {
                            // Requests complete out of arrival order; a
                            // long load must not block a status read.
                            let ctx = Arc::clone(&ctx);
                            let frame_tx = frame_tx.clone();
                            tokio::spawn(async move {
                                let reply = router::handle_request(&ctx, envelope).await;
                                let _ = frame_tx.send(ServerFrame::Reply(reply));
                            });
                        }
                        Err(ParseError::UnrecognizedKind { kind, id }) => {
                            warn!(kind = %kind, "unrecognized request kind");
                            let reply = Reply::failure(
                                id,
                                ErrorBody {
                                    code: "unrecognized_kind".into(),
                                    message: format!("unrecognized kind: {kind}"),
                                    needs_load: None,
                                    phase: None,
                                },
                            );
                            let _ = frame_tx.send(ServerFrame::Reply(reply));
                        }
                        Err(ParseError::Malformed(message)) => {
                            warn!(%message, "malformed request line");
                            let reply = Reply::failure(
                                None,
                                ErrorBody {
                                    code: "invalid_input".into(),
                                    message,
                                    needs_load: None,
                                    phase: None,
                                },
                            );
                            let _ = frame_tx.send(ServerFrame::Reply(reply));
                        }
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        ctx.connections.unregister(connection_id).await;
        drop(frame_tx);
        let _ = writer_task.await;
        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}
