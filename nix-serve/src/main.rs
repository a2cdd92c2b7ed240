use std::path::PathBuf;

use clap::Parser;
use nix_serve::config::{self, CliOverrides};
use nix_serve::error::Result;

/// Serve the local Nix store as a binary cache
#[derive(Parser, Debug)]
#[command(name = "nix-serve")]
#[command(version, about, long_about = None)]
struct Args {
    /// Host:port to listen to
    #[arg(long, value_name = "HOST:PORT")]
    listen: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn inner_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::load(&CliOverrides {
        config_file: args.config,
        listen: args.listen,
    })?;

    nix_serve::run(config).await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    inner_main().await.map_err(std::io::Error::other)
}
