#[cfg(feature = "prometheus")]
mod metrics_server;
mod relay_commands;
mod status_commands;

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "quietrelay",
    version,
    about = "quietrelay: relay a private Telegram channel to a public one"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Environment file read before configuration is loaded. A missing file
    /// is not an error.
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Start relaying (default when no subcommand is provided).
    Run,
    /// Validate configuration and print it with secrets redacted.
    CheckConfig,
    /// Run one connectivity check and print the health report.
    Health,
    /// Print the persisted relay statistics.
    Stats,
}

/// Load `path` into the process environment. Returns whether it existed.
fn load_env_file(path: &Path) -> anyhow::Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn log_filter(cli: &Cli) -> String {
    cli.log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| quietrelay_config::schema::DEFAULT_LOG_LEVEL.to_string())
        .to_ascii_lowercase()
}

/// Initialise tracing. `RUST_LOG` takes precedence over the configured level.
fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli)));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env_loaded = load_env_file(&cli.env_file)?;

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "quietrelay starting");
    if !env_loaded {
        debug!(path = %cli.env_file.display(), "env file not found, using process environment");
    }

    let config = quietrelay_config::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => relay_commands::run(config).await,
        Commands::CheckConfig => status_commands::check_config(&config),
        Commands::Health => status_commands::health(&config).await,
        Commands::Stats => status_commands::stats(&config),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["quietrelay"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.env_file, PathBuf::from(".env"));

        let cli = Cli::try_parse_from(["quietrelay", "check-config", "--json-logs"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert!(cli.json_logs);
    }

    #[test]
    fn explicit_log_level_wins() {
        let cli = Cli::try_parse_from(["quietrelay", "--log-level", "DEBUG"]).unwrap();
        assert_eq!(log_filter(&cli), "debug");
    }

    #[test]
    fn missing_env_file_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!load_env_file(&tmp.path().join("absent.env")).unwrap());
    }

    #[test]
    fn env_file_is_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, "QUIETRELAY_TEST_ENV_FILE=loaded\n").unwrap();
        assert!(load_env_file(&path).unwrap());
        assert_eq!(std::env::var("QUIETRELAY_TEST_ENV_FILE").unwrap(), "loaded");
    }
}
