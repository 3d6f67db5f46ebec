//! mv-demo: drives the log and HTTP services against the simulated host.
//!
//! ```text
//! every tick:
//!     LogSink::tick()            status poll, closes on network drop
//!     LogSink::log("Debug ping N")
//! optionally:
//!     drop the network after N pings, restore it two ticks later
//!     one HTTP GET through HttpClient
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hyper::http::Request;
use serde::Serialize;

use mv_channels::config::{load_config, ChannelsConfig};
use mv_channels::observability::{init_logging, init_metrics};
use mv_channels::{HttpClient, LogSink, Shutdown, SimProvider};

#[derive(Parser, Debug)]
#[command(name = "mv-demo")]
#[command(about = "Log and HTTP channel demo against a simulated host", long_about = None)]
struct Cli {
    /// TOML config file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of "Debug ping N" lines to log.
    #[arg(long, default_value_t = 10)]
    pings: u32,

    /// Scheduler tick in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Drop the network after this many pings.
    #[arg(long)]
    drop_after: Option<u32>,

    /// Status queries before the simulated network reports connected.
    #[arg(long, default_value_t = 0)]
    connect_delay: u32,

    /// Perform one HTTP GET to this URL after logging.
    #[arg(long)]
    http_get: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    pings: u32,
    lines_delivered: u32,
    lines_failed: u32,
    bytes_delivered: usize,
    bytes_lost: u64,
    disconnects: u32,
    http_status: Option<u16>,
    http_body_len: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ChannelsConfig::default(),
    };
    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mv-demo starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                shutdown.trigger();
            }
        });
    }

    let sim = Arc::new(SimProvider::new().with_connect_delay(cli.connect_delay));
    let tick = Duration::from_millis(cli.tick_ms.max(1));
    let mut summary = RunSummary {
        pings: cli.pings,
        ..RunSummary::default()
    };

    let mut log = LogSink::new(Arc::clone(&sim), &config, shutdown.subscribe());
    let mut ticker = tokio::time::interval(tick);
    let mut signal = shutdown.subscribe();

    for n in 0..cli.pings {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal.cancelled() => break,
        }

        match log.tick() {
            Ok(outcome) if outcome.disconnected => summary.disconnects += 1,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Status poll failed"),
        }

        if cli.drop_after == Some(n) {
            tracing::info!(after_pings = n, "Dropping simulated network");
            sim.drop_network();
            let sim = Arc::clone(&sim);
            tokio::spawn(async move {
                tokio::time::sleep(tick * 2).await;
                tracing::info!("Restoring simulated network");
                sim.restore_network();
            });
        }

        match log.log(&format!("Debug ping {n}")).await {
            Ok(_) => summary.lines_delivered += 1,
            Err(e) => {
                tracing::warn!(error = %e, "Log line not delivered");
                summary.lines_failed += 1;
            }
        }
    }

    summary.bytes_lost = log.bytes_lost();
    summary.bytes_delivered = sim.delivered(&config.log.endpoint).len();
    log.shutdown()?;

    if let Some(url) = cli.http_get.filter(|_| !shutdown.is_triggered()) {
        let mut http = HttpClient::new(Arc::clone(&sim), &config, shutdown.subscribe());
        let request = Request::get(url.as_str()).body(Vec::new())?;
        match http.send(request).await {
            Ok(response) => {
                summary.http_status = Some(response.status().as_u16());
                summary.http_body_len = Some(response.body().len());
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "HTTP request failed"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!("Shutdown complete");
    Ok(())
}
