use arena_tests::TestServer;

/// Smoke test: server ticks with nobody connected and stops on request.
#[tokio::test]
async fn server_runs_and_stops() -> anyhow::Result<()> {
    let server = TestServer::start(64).await?;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let status = server.gateway.status().await?;
    assert!(status.tick > 0);
    assert!(status.sessions.is_empty());
    server.stop().await
}

#[tokio::test]
async fn zero_tick_rate_is_refused_at_bind() {
    let result = arena_server::server::bind_ephemeral(0).await;
    assert!(result.is_err());
}
