//! End-to-end IPC tests over a real local socket.

use std::sync::Arc;

use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::{tokio::Stream, GenericNamespaced};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use loomd::ipc::server::spawn_ipc_server;
use loomd::protocol::Broadcast;

use super::test_helpers::{memory_ctx_with, test_config_toml, FakeCapability};

async fn connect(ipc_name: &str) -> Stream {
    let name = ipc_name
        .to_owned()
        .to_ns_name::<GenericNamespaced>()
        .expect("socket name");
    Stream::connect(name).await.expect("connect")
}

async fn read_frame(
    reader: &mut BufReader<impl tokio::io::AsyncRead + Unpin>,
) -> serde_json::Value {
    let mut line = String::new();
    tokio::time::timeout(std::time::Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timed out reading frame")
        .expect("read line");
    serde_json::from_str(line.trim()).expect("frame json")
}

#[tokio::test]
async fn get_status_round_trips_over_the_socket() {
    let ipc_name = format!("loomd-test-{}", Uuid::new_v4());
    let config = test_config_toml(&format!("ipc_name = \"{ipc_name}\"\n"));
    let ctx = memory_ctx_with(config, Arc::new(FakeCapability::ready())).await;

    let cancel = CancellationToken::new();
    let _server = spawn_ipc_server(Arc::clone(&ctx), cancel.clone()).expect("spawn");

    let stream = connect(&ipc_name).await;
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    writer
        .write_all(b"{\"id\":\"1\",\"kind\":\"get-status\"}\n")
        .await
        .expect("write");

    let frame = read_frame(&mut reader).await;
    assert_eq!(frame["type"], "reply");
    assert_eq!(frame["id"], "1");
    assert_eq!(frame["ok"], true);
    assert_eq!(frame["data"]["phase"], "unloaded");

    cancel.cancel();
}

#[tokio::test]
async fn unknown_kind_gets_a_structured_error_reply() {
    let ipc_name = format!("loomd-test-{}", Uuid::new_v4());
    let config = test_config_toml(&format!("ipc_name = \"{ipc_name}\"\n"));
    let ctx = memory_ctx_with(config, Arc::new(FakeCapability::ready())).await;

    let cancel = CancellationToken::new();
    let _server = spawn_ipc_server(Arc::clone(&ctx), cancel.clone()).expect("spawn");

    let stream = connect(&ipc_name).await;
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    writer
        .write_all(b"{\"id\":\"9\",\"kind\":\"reboot-host\",\"payload\":{}}\n")
        .await
        .expect("write");

    let frame = read_frame(&mut reader).await;
    assert_eq!(frame["type"], "reply");
    assert_eq!(frame["id"], "9");
    assert_eq!(frame["ok"], false);
    assert_eq!(frame["error"]["code"], "unrecognized_kind");

    cancel.cancel();
}

#[tokio::test]
async fn connected_frontends_receive_broadcast_frames() {
    let ipc_name = format!("loomd-test-{}", Uuid::new_v4());
    let config = test_config_toml(&format!("ipc_name = \"{ipc_name}\"\n"));
    let ctx = memory_ctx_with(config, Arc::new(FakeCapability::ready())).await;

    let cancel = CancellationToken::new();
    let _server = spawn_ipc_server(Arc::clone(&ctx), cancel.clone()).expect("spawn");

    let stream = connect(&ipc_name).await;
    let (reader, _writer) = stream.split();
    let mut reader = BufReader::new(reader);

    // Wait for the connection to land in the registry before fanning out.
    for _ in 0..50 {
        if !ctx.connections.is_empty().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(ctx.connections.len().await, 1);

    ctx.connections
        .broadcast(Broadcast::Loaded {
            session_id: "tinyllama-1.1b-chat-q4".into(),
        })
        .await;

    let frame = read_frame(&mut reader).await;
    assert_eq!(frame["type"], "broadcast");
    assert_eq!(frame["kind"], "loaded");
    assert_eq!(frame["payload"]["sessionId"], "tinyllama-1.1b-chat-q4");

    cancel.cancel();
}
