//! chunkdrop entry point.

mod app;
mod config;
mod web;

use std::path::PathBuf;

use chunkdrop_transfer::CleanupScope;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Chunked file uploads over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "chunkdrop", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory uploads are written to.
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Port of the landing page.
    #[arg(long)]
    http_port: Option<u16>,

    /// Port of the upload WebSocket server.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Transfers closed on disconnect: `connection` or `global`.
    #[arg(long)]
    cleanup_scope: Option<CleanupScope>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting chunkdrop");

    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply(config::Overrides {
        upload_dir: cli.upload_dir,
        http_port: cli.http_port,
        ws_port: cli.ws_port,
        cleanup_scope: cli.cleanup_scope,
    });
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        cleanup_scope = %config.cleanup_scope,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("chunkdrop shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "chunkdrop",
            "--config",
            "/etc/chunkdrop.toml",
            "--ws-port",
            "9000",
            "--cleanup-scope",
            "global",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/chunkdrop.toml")));
        assert_eq!(cli.ws_port, Some(9000));
        assert_eq!(cli.cleanup_scope, Some(CleanupScope::Global));
        assert_eq!(cli.http_port, None);
    }

    #[test]
    fn cli_rejects_unknown_scope() {
        assert!(Cli::try_parse_from(["chunkdrop", "--cleanup-scope", "all"]).is_err());
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
