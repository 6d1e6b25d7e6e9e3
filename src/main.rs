use anyhow::Result;
use clap::Parser;
use contract_caller::{config::Config, server::ContractCallerServer};
use std::path::PathBuf;
use tracing::info;

/// MCP server that calls contract functions and sends locally signed transactions
#[derive(Debug, Parser)]
#[command(name = "contract-caller", version)]
struct Cli {
    /// Configuration file; defaults to the user config directory when present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Network used when a request names neither provider nor network
    #[arg(short, long)]
    network: Option<String>,

    /// Replaces the RPC URL of the default network
    #[arg(short, long, value_name = "URL")]
    rpc_url: Option<String>,

    /// Seconds allowed for each node round-trip
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    rpc_timeout: Option<u64>,

    /// Enable the send_transaction tool
    #[arg(long)]
    allow_writes: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Print the default configuration file path and exit
    #[arg(long)]
    config_path: bool,
}

impl Cli {
    async fn into_config(self) -> Config {
        let path = self.config.or_else(|| {
            Config::default_config_path()
                .ok()
                .filter(|path| path.exists())
        });
        let mut config = Config::load_or_default(path).await;

        if let Some(network) = self.network {
            config.default_network = network;
        }
        if let Some(rpc_url) = self.rpc_url {
            match config.networks.get_mut(&config.default_network) {
                Some(network) => network.rpc_url = rpc_url,
                None => tracing::warn!(
                    "Ignoring --rpc-url: network '{}' is not configured",
                    config.default_network
                ),
            }
        }
        if let Some(timeout_secs) = self.rpc_timeout {
            config.rpc.timeout_secs = timeout_secs;
        }
        config.security.allow_write_operations |= self.allow_writes;

        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::generate_sample());
        return Ok(());
    }
    if cli.config_path {
        println!("{}", Config::default_config_path()?.display());
        return Ok(());
    }

    let config = cli.into_config().await;
    info!(
        network = %config.default_network,
        timeout_secs = config.rpc.timeout_secs,
        writes = config.security.allow_write_operations,
        "Starting Contract Caller"
    );

    ContractCallerServer::new(config)?.run().await
}
