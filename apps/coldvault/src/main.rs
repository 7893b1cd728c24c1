//! coldvault: stream a directory tree into a cold-storage vault.

mod app;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "coldvault")]
#[command(about = "Archive a directory tree into a vault, one multipart upload per file", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the directory tree to archive
    #[arg(long)]
    root: Option<String>,

    /// Override the destination vault
    #[arg(long)]
    vault: Option<String>,

    /// Override the part size in bytes
    #[arg(long)]
    part_size: Option<usize>,

    /// Override the local sink storage directory
    #[arg(long)]
    sink_dir: Option<String>,

    /// Override the number of chunks buffered per file
    #[arg(long)]
    channel_capacity: Option<usize>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(root) = self.root {
            config.root_dir = root;
        }
        if let Some(vault) = self.vault {
            config.vault = vault;
        }
        if let Some(part_size) = self.part_size {
            config.part_size = part_size;
        }
        if let Some(sink_dir) = self.sink_dir {
            config.sink_dir = sink_dir;
        }
        if let Some(capacity) = self.channel_capacity {
            config.channel_capacity = capacity;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,coldvault=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(app::run(config))
}
