use std::path::PathBuf;

use arena::{ArenaError, ArenaServer, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Arena game server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file. Missing file means defaults.
    #[arg(short, long, default_value = "arena.toml")]
    config: PathBuf,
    /// WebSocket port, overriding the config file
    #[arg(long)]
    tcp_port: Option<u16>,
    /// UDP port, overriding the config file
    #[arg(long)]
    udp_port: Option<u16>,
    /// Directory holding the map documents
    #[arg(long)]
    maps: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = port;
        }
        if let Some(maps) = self.maps {
            config.maps_dir = maps;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: ServerConfig) -> Result<(), ArenaError> {
    let server = ArenaServer::builder().config(config).build().await?;
    server.start();
    server.run_until(tokio::signal::ctrl_c()).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "configuration error");
            std::process::exit(e.exit_code());
        }
    };
    args.apply(&mut config);
    init_tracing(&config.log_level);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, code = e.exit_code(), "arena server stopped");
        std::process::exit(e.exit_code());
    }
    tracing::info!("arena server stopped");
}
