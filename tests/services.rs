//! Log and HTTP service behaviour against the simulated host.

use std::sync::Arc;
use std::time::Duration;

use hyper::http::Request;
use mv_channels::config::{load_config, ConfigError};
use mv_channels::lifecycle::{LifecycleError, LifecycleState, ShutdownSignal};
use mv_channels::provider::{ProviderCall, SimProvider, SimResponse};
use mv_channels::{HttpClient, LogSink, ServiceError};

mod common;

#[tokio::test]
async fn test_log_sink_reopens_after_network_drop() {
    let sim = Arc::new(SimProvider::new());
    let mut log = LogSink::new(Arc::clone(&sim), &common::fast_config(), ShutdownSignal::never());

    log.log("Debug ping 0").await.unwrap();
    let first = log.lifecycle().handles();

    sim.drop_network();
    let restorer = {
        let sim = Arc::clone(&sim);
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sim.restore_network();
        }
    };
    let (result, ()) = tokio::join!(log.log("Debug ping 1"), restorer);
    result.unwrap();

    assert_eq!(sim.delivered("log"), b"Debug ping 0\nDebug ping 1\n");
    assert_ne!(log.lifecycle().handles().channel, first.channel);
    assert_eq!(
        common::release_calls(&sim),
        vec!["close_channel", "release_network", "close_notifications"]
    );
    assert_eq!(log.bytes_lost(), 0);
}

#[tokio::test]
async fn test_log_sink_tick_closes_on_drop() {
    let sim = Arc::new(SimProvider::new());
    let mut log = LogSink::new(Arc::clone(&sim), &common::fast_config(), ShutdownSignal::never());
    log.log("up").await.unwrap();

    sim.drop_network();
    let outcome = log.tick().unwrap();
    assert!(outcome.disconnected);
    assert_eq!(log.lifecycle().state(), LifecycleState::Idle);
    assert_eq!(sim.live_handles(), 0);
}

#[tokio::test]
async fn test_log_sink_reports_unavailable_and_counts_loss() {
    let sim = Arc::new(SimProvider::new().with_link_down());
    let mut config = common::fast_config();
    config.lifecycle.network_ready_timeout_ms = 10;
    let mut log = LogSink::new(Arc::clone(&sim), &config, ShutdownSignal::never());

    let err = log.log("nobody hears this").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Unavailable {
            source: LifecycleError::NetworkTimeout { .. },
            ..
        }
    ));
    assert!(err.to_string().starts_with("log service unavailable"));
    assert_eq!(log.bytes_lost(), 18);
    assert_eq!(log.lifecycle().state(), LifecycleState::Idle);
    assert!(sim.delivered("log").is_empty());
}

#[tokio::test]
async fn test_http_client_round_trip() {
    let sim = Arc::new(SimProvider::new().with_http_responder(|req| {
        let body = format!("{} {}", req.method, req.url).into_bytes();
        SimResponse {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body,
        }
    }));
    let mut http = HttpClient::new(Arc::clone(&sim), &common::fast_config(), ShutdownSignal::never());

    let request = Request::post("http://example.com/telemetry")
        .header("X-Device", "mv")
        .body(b"{}".to_vec())
        .unwrap();
    let response = http.send(request).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.body(), b"POST http://example.com/telemetry");

    let opened: Vec<_> = sim
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ProviderCall::OpenChannel { endpoint, kind, .. } => Some((endpoint, kind)),
            _ => None,
        })
        .collect();
    assert_eq!(opened, vec![(String::new(), mv_channels::provider::ChannelKind::Http)]);
    assert_eq!(http.lifecycle().state(), LifecycleState::Idle);
    assert_eq!(sim.live_handles(), 0);
}

#[tokio::test]
async fn test_http_client_reopens_per_request() {
    let sim = Arc::new(SimProvider::new());
    let mut http = HttpClient::new(Arc::clone(&sim), &common::fast_config(), ShutdownSignal::never());

    for _ in 0..2 {
        let request = Request::get("http://example.com/").body(Vec::new()).unwrap();
        let response = http.send(request).await.unwrap();
        assert_eq!(response.body(), b"OK");
    }
    assert_eq!(sim.count(|c| matches!(c, ProviderCall::SetupNotifications { .. })), 2);
    assert_eq!(sim.count(|c| matches!(c, ProviderCall::CloseNotifications { .. })), 2);
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("mv-channels-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        [log]
        irq = 60
        endpoint = "audit"
        receive_buffer_len = 16
        send_buffer_len = 600

        [lifecycle]
        poll_interval_ms = 1
        "#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.log.irq, 60);
    assert_eq!(config.http.irq, 44);

    let sim = Arc::new(SimProvider::new());
    let mut log = LogSink::new(Arc::clone(&sim), &config, ShutdownSignal::never());
    log.log("to audit").await.unwrap();
    assert_eq!(sim.delivered("audit"), b"to audit\n");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let path = std::env::temp_dir().join(format!("mv-channels-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "[retries]\nmax_attempts = \"three\"\n").unwrap();
    let err = load_config(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, ConfigError::Parse(_)));
}
