//! sunface - weather watch face coordinator
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use sunface_app::config::{load_settings, Settings};

/// sunface - weather watch face coordinator
#[derive(Parser, Debug)]
#[command(name = "sunface")]
#[command(about = "Weather watch face coordinator with NDJSON output", long_about = None)]
struct Args {
    /// Peer address; without one the built-in loopback peer is used
    #[arg(long, value_name = "HOST:PORT")]
    peer: Option<String>,

    /// Interactive tick interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Path to config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Command-line flags win over file values
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(peer) = &self.peer {
            settings.peer.address = Some(peer.clone());
        }
        if let Some(interval_ms) = self.interval_ms {
            settings.clock.interactive_interval_ms = interval_ms;
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    sunface_core::logging::init()?;

    let mut settings = load_settings(args.config.as_deref());
    args.apply_to(&mut settings);

    sunface::run_headless(settings).await?;
    Ok(())
}
