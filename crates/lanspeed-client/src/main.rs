// ============================================
// File: crates/lanspeed-client/src/main.rs
// ============================================
//! # LanSpeed Client Entry Point
//!
//! ## Usage
//! ```bash
//! lanspeed-client --url ws://192.168.1.10:3000 --kind both
//! lanspeed-client -u ws://192.168.1.10:3000 -k upload --window-size 5
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lanspeed_client::{ClientError, DriverConfig, DriverEvent, TestReport, TestRunner};
use lanspeed_common::{Direction, TestKind};
use lanspeed_core::measure::{DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW_SIZE};
use lanspeed_core::SpeedSummary;
use lanspeed_transport::WsTransport;

// ============================================
// CLI Definition
// ============================================

/// LAN throughput test client
#[derive(Parser, Debug)]
#[command(name = "lanspeed-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    url: String,

    /// Test to run: upload, download or both
    #[arg(short, long, default_value = "both")]
    kind: TestKind,

    /// Samples in the local speed window
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Upload chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Expected pause between the legs of a `both` test, in ms
    #[arg(long, default_value_t = 1_000)]
    settle_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        let code = exit_code(&e);
        if code == 130 {
            println!("⏹  Test stopped");
        } else {
            error!("{}", e);
            eprintln!("❌ {e}");
            if code == 75 {
                eprintln!("   The connection failed; the test can be run again.");
            }
        }
        std::process::exit(code);
    }
}

/// Exit status for a failed run.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ClientError>()
        .map_or(1, ClientError::exit_code)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DriverConfig {
        chunk_size: cli.chunk_size,
        window_size: cli.window_size,
        settle_delay: Duration::from_millis(cli.settle_delay_ms),
    };

    info!("Connecting to {}", cli.url);
    let transport = Arc::new(
        WsTransport::connect(&cli.url)
            .await
            .map_err(ClientError::from)?,
    );
    println!("🚀 Connected to {}", cli.url);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(event_rx));

    let (stop_tx, stop_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    let mut runner = TestRunner::new(transport, config)?.with_events(event_tx);
    let result = runner.run(cli.kind, stop_rx).await;
    drop(runner);
    let _ = printer.await;

    let report = result?;
    print_report(&report);
    Ok(())
}

// ============================================
// Output
// ============================================

async fn print_events(mut rx: mpsc::UnboundedReceiver<DriverEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DriverEvent::LegStarted { direction, .. } => {
                println!();
                println!("▶ {} test started", label(direction));
            }
            DriverEvent::Progress {
                direction,
                progress,
                current_speed,
                ..
            } => {
                println!(
                    "   {:<8} {:>5.1}%  {:>9.2} MB/s",
                    label(direction),
                    progress,
                    current_speed
                );
            }
            DriverEvent::LegFinished { direction, result } => {
                println!("✅ {} finished", label(direction));
                print_summary(&result);
            }
            DriverEvent::ServerError(message) => println!("⚠️  Server error: {message}"),
            DriverEvent::SpeedUpdate { .. } | DriverEvent::Complete(_) => {}
        }
    }
}

fn print_report(report: &TestReport) {
    println!();
    println!("════════════════════════════════════════");
    if let Some(upload) = &report.upload {
        println!("   Upload:     {:.2} MB/s", upload.average_speed);
    }
    if let Some(download) = &report.download {
        println!("   Download:   {:.2} MB/s", download.average_speed);
    }
    println!("   Elapsed:    {:.1}s", report.elapsed.as_secs_f64());
    println!("════════════════════════════════════════");
}

fn print_summary(summary: &SpeedSummary) {
    println!("   Average:    {:.2} MB/s", summary.average_speed);
    println!("   Max:        {:.2} MB/s", summary.max_speed);
    println!("   Min:        {:.2} MB/s", summary.min_speed);
    println!("   Duration:   {} ms", summary.duration_ms);
}

const fn label(direction: Direction) -> &'static str {
    match direction {
        Direction::Upload => "Upload",
        Direction::Download => "Download",
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use lanspeed_transport::TransportError;

    use super::*;

    #[test]
    fn test_exit_code_follows_client_error() {
        assert_eq!(exit_code(&ClientError::Cancelled.into()), 130);
        assert_eq!(exit_code(&ClientError::from(TransportError::Closed).into()), 75);
        assert_eq!(exit_code(&anyhow::anyhow!("bad url")), 1);
    }
}
