//! # plugin-installer
//!
//! Command-line entry point: installs or removes one plugin and writes its
//! status back. See [`plugin_installer::cli`] for the arguments.

use anyhow::Result;
use clap::Parser;
use plugin_installer::cli::{self, Cli};
use plugin_installer::config::InstallerConfig;
use plugin_installer::runtime::initialize;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = InstallerConfig::from_env();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone())
        .to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("plugin_installer={level}").into()),
        )
        .init();

    // rustls 0.23 needs a process-wide provider before the first TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let installer = initialize(config, None).await?;
    cli::run(cli, &installer).await
}
