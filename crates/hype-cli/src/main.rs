//! `hype` command-line entry point.
//!
//! `hype run` starts the scheduler loop; `hype tick` runs exactly one
//! boost cycle and exits. Configuration comes from `auth.yaml` and
//! `config.yaml` in the config directory; a missing or incomplete auth
//! document is fatal with a non-zero exit code.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hype_core::mastodon::{ClientRegistry, HttpMastodonClient, MastodonApi};
use hype_core::{BoostEngine, Config};

#[derive(Parser)]
#[command(name = "hype", about = "Boost trending posts from subscribed instances", version)]
struct Cli {
    /// Directory containing auth.yaml and config.yaml.
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler: one cycle now, then every interval.
    Run,
    /// Run a single boost cycle and exit.
    Tick,
}

fn init_tracing(log_level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let auth_path = cli.config_dir.join("auth.yaml");
    let settings_path = cli.config_dir.join("config.yaml");
    let config = Config::load(&auth_path, &settings_path).context("loading configuration")?;

    init_tracing(&config.log_level);
    tracing::info!(server = %config.bot_account.server, "config loaded");

    let home: Arc<dyn MastodonApi> = Arc::new(
        HttpMastodonClient::with_token(&config.bot_account.server, &config.bot_account.access_token)
            .context("building publishing-host client")?,
    );
    let registry = Arc::new(ClientRegistry::new(config.secrets_dir.clone()));
    let mut engine = BoostEngine::new(config, registry, home);

    match cli.command {
        Command::Tick => {
            engine.cycle().await;
        }
        Command::Run => {
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received");
                    signal_cancel.cancel();
                }
            });
            engine.run(cancel).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_dir_defaults_to_config() {
        let cli = Cli::parse_from(["hype", "tick"]);
        assert_eq!(cli.config_dir, PathBuf::from("config"));
        assert!(matches!(cli.command, Command::Tick));
    }

    #[test]
    fn config_dir_flag_overrides_default() {
        let cli = Cli::parse_from(["hype", "--config-dir", "/etc/hype", "run"]);
        assert_eq!(cli.config_dir, PathBuf::from("/etc/hype"));
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn missing_auth_document_is_a_startup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(
            &dir.path().join("auth.yaml"),
            &dir.path().join("config.yaml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("auth.yaml"));
    }
}
