//! Common test utilities and fixtures

use fix_engine::{ClientConfig, FixClient, FixServer, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Fixed sending time for deterministic frames
pub const TEST_TS: &str = "20260808-12:00:00.000";

/// Acceptor config with fill delays short enough for tests
pub fn fast_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        heartbeat_interval_secs: 5,
        market_fill_delay_ms: 50,
        limit_fill_delay_ms: 150,
        final_fill_delay_ms: 300,
        ..ServerConfig::default()
    }
}

/// Acceptor config whose fills never arrive within a test run
pub fn slow_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        heartbeat_interval_secs: 5,
        market_fill_delay_ms: 60_000,
        limit_fill_delay_ms: 60_000,
        final_fill_delay_ms: 60_000,
        ..ServerConfig::default()
    }
}

/// Bind an acceptor on an ephemeral port and run it in the background
pub async fn start_server(config: ServerConfig) -> (Arc<FixServer>, SocketAddr) {
    let server = Arc::new(FixServer::bind(config).await.expect("bind test server"));
    let addr = server.local_addr().expect("server local addr");
    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.run().await;
    });
    (server, addr)
}

/// Connect an initiator to the given acceptor and complete the logon
pub async fn connect_client(addr: SocketAddr) -> FixClient {
    let config = ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        heartbeat_interval_secs: 5,
        ..ClientConfig::default()
    };
    let client = FixClient::connect(config).await.expect("connect test client");
    client
        .wait_for_logon(Duration::from_secs(5))
        .await
        .expect("logon handshake");
    client
}

/// Poll `condition` every 10ms until it holds or `max_wait` elapses
pub async fn wait_until<F>(mut condition: F, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
