//! Socket-based integration tests for client <-> server communication.

use std::time::Duration;

use arena_client::{
    client::ClientState,
    input::{build_command, InputState},
};
use arena_shared::{
    codec::{ControlMsg, ServerMsg},
    entity::{default_arena, EntityKind},
    net::{self, SessionId},
};
use arena_tests::{init_tracing, recv_until, TestServer};

const WAIT: Duration = Duration::from_secs(3);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_frame_is_full_sync() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;
    let mut client = server.connect().await?;

    let first = tokio::time::timeout(WAIT, client.recv()).await??;
    let Some(ServerMsg::Snapshot(body)) = first else {
        anyhow::bail!("expected a snapshot as the first frame");
    };
    let n = default_arena().len();
    let kinds = 1 + 4 * n;
    let vecs = 1 + 24 * n;
    for at in [0, kinds, kinds + vecs, kinds + 2 * vecs] {
        assert_eq!(body[at], 0b111);
    }
    assert_eq!(client.state, ClientState::Synced);
    assert_eq!(client.entities(), &default_arena()[..]);
    assert_eq!(client.entities()[2].kind, EntityKind::Ball);

    let second = tokio::time::timeout(WAIT, client.recv()).await??;
    assert!(matches!(second, Some(ServerMsg::Control(ControlMsg::AssignId { .. }))));
    assert!(client.session_id().is_some());

    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn presence_is_announced_both_ways() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;

    let mut a = server.connect().await?;
    recv_until(&mut a, WAIT, |_, c| c.session_id().is_some()).await?;
    let a_id = a.session_id().unwrap();

    let mut b = server.connect().await?;
    recv_until(&mut b, WAIT, |msg, _| {
        matches!(msg, ServerMsg::Control(ControlMsg::Join { id, .. }) if *id == a_id)
    })
    .await?;
    let b_id = b.session_id().unwrap();
    assert!(b_id > a_id);

    recv_until(&mut a, WAIT, |msg, _| {
        matches!(msg, ServerMsg::Control(ControlMsg::Join { id, .. }) if *id == b_id)
    })
    .await?;
    assert_eq!(a.mirror.roster[&b_id].name, format!("player{}", b_id.0));

    b.leave().await?;
    recv_until(&mut a, WAIT, |msg, _| {
        matches!(msg, ServerMsg::Control(ControlMsg::Leave { id }) if *id == b_id)
    })
    .await?;
    assert!(a.mirror.roster.is_empty());

    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commands_move_the_paddle() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;
    let mut client = server.connect().await?;
    recv_until(&mut client, WAIT, |_, c| c.session_id().is_some()).await?;

    client
        .send_command(build_command(InputState { up: true, down: false }))
        .await?;
    recv_until(&mut client, WAIT, |_, c| c.entities()[0].position.y > 0.0).await?;
    assert!(client.entities()[0].velocity.y > 0.0);
    // Nobody steers the second paddle.
    assert_eq!(client.entities()[1].position, default_arena()[1].position);

    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_and_malformed_clients_are_reaped() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;

    let mut watcher = server.connect().await?;
    recv_until(&mut watcher, WAIT, |_, c| c.session_id().is_some()).await?;

    // Abrupt close.
    let gone = server.connect().await?;
    let gone_id = SessionId(watcher.session_id().unwrap().0 + 1);
    recv_until(&mut watcher, WAIT, |msg, _| {
        matches!(msg, ServerMsg::Control(ControlMsg::Join { id, .. }) if *id == gone_id)
    })
    .await?;
    drop(gone);
    recv_until(&mut watcher, WAIT, |msg, _| {
        matches!(msg, ServerMsg::Control(ControlMsg::Leave { id }) if *id == gone_id)
    })
    .await?;

    // A frame that is neither a command nor a known control message.
    let (mut reader, mut writer) = net::connect(server.addr, 4096).await?;
    writer.send(&[0xde, 0xad, 0xbe, 0xef, 0x00]).await?;
    let closed = tokio::time::timeout(WAIT, async {
        while reader.recv().await?.is_some() {}
        Ok::<_, anyhow::Error>(())
    })
    .await;
    assert!(closed.is_ok(), "server should close a malformed peer");

    let status = server.gateway.status().await?;
    assert_eq!(status.sessions.len(), 1);
    assert_eq!(status.sessions[0].id, watcher.session_id().unwrap());

    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kicked_client_sees_close() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;
    let mut client = server.connect().await?;
    recv_until(&mut client, WAIT, |_, c| c.session_id().is_some()).await?;

    server.gateway.disconnect(client.session_id().unwrap()).await?;
    let drained = tokio::time::timeout(WAIT, async {
        loop {
            match client.recv().await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    })
    .await;
    assert!(drained.is_ok());
    assert_eq!(client.state, ClientState::Disconnected);

    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopping_the_server_closes_clients_cleanly() -> anyhow::Result<()> {
    init_tracing();
    let server = TestServer::start(64).await?;
    let mut client = server.connect().await?;
    recv_until(&mut client, WAIT, |_, c| c.state == ClientState::Synced).await?;

    server.stop().await?;
    // Whatever was queued is flushed, then the stream ends without an error.
    let closed = tokio::time::timeout(WAIT, async {
        loop {
            if client.recv().await?.is_none() {
                return anyhow::Ok(());
            }
        }
    })
    .await;
    assert!(matches!(closed, Ok(Ok(()))));
    assert_eq!(client.state, ClientState::Disconnected);
    Ok(())
}
