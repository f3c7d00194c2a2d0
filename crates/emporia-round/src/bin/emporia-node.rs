//! `emporia-node [--config config.json]`
//!
//! Runs every configured market until Ctrl-C. Without a config file a single
//! market named `"0"` is served with default timing and limits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use emporia_round::{MarketRegistry, telemetry};
use emporia_types::{EmporiaConfig, Result, constants};

#[derive(Parser, Debug)]
#[command(name = "emporia-node", version)]
#[command(about = "Run Emporia trading-round markets until interrupted")]
struct Cli {
    /// JSON configuration file (markets, timing, limits, redaction)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<EmporiaConfig> {
        let Some(path) = &self.config else {
            return Ok(EmporiaConfig::default());
        };
        tracing::info!(path = %path.display(), "loading configuration");
        EmporiaConfig::from_json_str(&std::fs::read_to_string(path)?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_logging();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, kind = %err.kind(), "emporia-node failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    tracing::info!(
        engine = constants::ENGINE_NAME,
        version = constants::VERSION,
        markets = config.markets.len(),
        "starting"
    );

    let registry = MarketRegistry::start(&config)?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    registry.shutdown().await;
    Ok(())
}
