// ============================================
// File: crates/lanspeed-server/src/main.rs
// ============================================
//! # LanSpeed Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the speed test server binary. Handles CLI
//! parsing, logging setup and server startup.
//!
//! ## Usage
//! ```bash
//! # Write a default configuration
//! lanspeed-server init > /etc/lanspeed/server.toml
//!
//! # Check it
//! lanspeed-server validate --config /etc/lanspeed/server.toml
//!
//! # Run
//! lanspeed-server start --config /etc/lanspeed/server.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A missing config file is not an error; defaults are used
//! - `RUST_LOG` overrides the configured log level
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lanspeed_server::{Server, ServerConfig, ServerError};

// ============================================
// CLI Definition
// ============================================

/// LAN throughput test server
#[derive(Parser, Debug)]
#[command(name = "lanspeed-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/lanspeed/server.toml")]
        config: PathBuf,

        /// Override the configured listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },

    /// Validate configuration file and print the effective settings
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/lanspeed/server.toml")]
        config: PathBuf,
    },

    /// Print a default configuration file
    Init,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { config, listen } => cmd_start(config, listen).await,
        Commands::Validate { config } => {
            init_logging("info");
            cmd_validate(config).await
        }
        Commands::Init => cmd_init(),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(exit_code(&e));
    }
}

// ============================================
// Commands
// ============================================

/// Starts the server.
async fn cmd_start(config_path: PathBuf, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut config = load_or_default_config(&config_path).await?;
    if let Some(addr) = listen {
        config.network.listen_addr = addr;
    }

    init_logging(&config.logging.level);
    if !config_path.exists() {
        info!("Config file {} not found, using defaults", config_path.display());
    }

    info!("════════════════════════════════════════");
    info!("Upload:     {} ms", config.speed_test.upload_duration_ms);
    info!("Download:   {} ms", config.speed_test.download_duration_ms);
    info!("Chunk size: {} bytes", config.speed_test.chunk_size);
    info!("════════════════════════════════════════");

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Server will use default values.");
        return Ok(());
    }

    let config = ServerConfig::load(&config_path).await?;
    let speed = &config.speed_test;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:          {}", config.listen_addr());
    println!();
    println!("Speed Test:");
    println!("   Upload:          {} ms", speed.upload_duration_ms);
    println!("   Download:        {} ms", speed.download_duration_ms);
    println!("   Chunk Size:      {} bytes", speed.chunk_size);
    println!("   Fill:            {:?}", speed.fill_method);
    println!("   Progress Every:  {} ms", speed.progress_interval_ms);
    println!("   Watchdog Grace:  {} ms", speed.watchdog_grace_ms);
    println!("   Speed Window:    {} samples", speed.window_size);
    println!("   Settle Delay:    {} ms", speed.settle_delay_ms);
    println!("   Download Volume: {} bytes", speed.download_total_bytes());
    println!();
    println!("Limits:");
    println!("   Max Sessions:    {}", config.max_sessions());
    println!();

    Ok(())
}

/// Prints the default configuration.
fn cmd_init() -> anyhow::Result<()> {
    print!("{}", ServerConfig::default().to_toml());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ServerError>()
        .map_or(1, ServerError::exit_code)
}

/// Loads config, or defaults when the file does not exist.
async fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path).await?)
    } else {
        Ok(ServerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_server_error() {
        let err = anyhow::Error::from(ServerError::config_invalid("port", "must be > 0"));
        assert_eq!(exit_code(&err), 78);

        let err = anyhow::Error::from(ServerError::startup_failed("address in use"));
        assert_eq!(exit_code(&err), 69);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
