//! Leasehold host binary

use clap::Parser;

use leasehold::Cli;
use leasehold_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.settings.log_json,
        ..Default::default()
    })?;

    cli.run().await
}
