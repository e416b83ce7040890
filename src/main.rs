use anyhow::{bail, Context};
use clap::Parser;
use ddwatch::aggregator::LogProcessor;
use ddwatch::backend::{DatadogBackend, LogFetchClient};
use ddwatch::config::Config;
use ddwatch::links::FileLinkSource;
use ddwatch::output::ReportWriter;
use ddwatch::scheduler::{CycleOutcome, PollScheduler};
use ddwatch::server::{self, AppState};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Command-line arguments for the Datadog error monitor
#[derive(Parser)]
#[command(
    name = "ddwatch",
    about = "Datadog error monitor - polls saved log searches and consolidates errors",
    long_about = "Periodically runs every saved Datadog log search listed in the links file, \
                  restricts it to error and critical entries, merges the results into one \
                  errors.json report and serves it over HTTP."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Run a single poll cycle and exit
    #[arg(long, help = "Run one poll cycle, write the report and exit")]
    once: bool,

    /// Override the HTTP port
    #[arg(short, long, value_name = "PORT", help = "HTTP port (overrides PORT)")]
    port: Option<u16>,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in Config::load
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if self.port == Some(0) {
            return Err("Port must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Wire the configured components together and run until shutdown
async fn run(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let backend = DatadogBackend::new(
        &config.datadog.site,
        config.datadog.api_key.clone(),
        config.datadog.app_key.clone(),
    )?;
    let processor = LogProcessor::new(
        LogFetchClient::new(Arc::new(backend)),
        ReportWriter::new(&config.paths.data_dir),
        config.polling.logs_window_minutes,
        config.polling.max_logs_per_query,
    );
    let links = Arc::new(FileLinkSource::new(&config.paths.links_file));

    info!(
        "Polling {} every {}s over a {}-minute window (max {} logs per query)",
        config.paths.links_file.display(),
        config.polling.interval_seconds,
        config.polling.logs_window_minutes,
        config.polling.max_logs_per_query
    );

    let shutdown = CancellationToken::new();
    let mut scheduler =
        PollScheduler::new(processor, links, config.polling.interval()).with_parent(&shutdown);

    if cli.once {
        return match scheduler.run_once().await {
            CycleOutcome::Completed => Ok(()),
            outcome => bail!("Poll cycle {}", outcome),
        };
    }

    // SIGINT and SIGTERM (ctrlc "termination" feature)
    let signal_token = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received termination signal, shutting down gracefully...");
        signal_token.cancel();
    })
    .context("Error setting signal handler for graceful shutdown")?;

    scheduler.start().await?;

    let state = AppState {
        writer: ReportWriter::new(&config.paths.data_dir),
        monitor: scheduler.monitor().clone(),
    };

    info!("ddwatch is running. Press Ctrl+C to stop.");
    let served = server::serve(config.server.port, state, shutdown.clone()).await;

    // The server may have failed on its own; stop polling either way.
    shutdown.cancel();
    scheduler.stop().await;

    served
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting ddwatch");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut config = match Config::from_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Err(e) = run(&cli, config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("ddwatch shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    fn cli(config: Option<PathBuf>) -> Cli {
        Cli {
            config,
            verbose: false,
            once: false,
            port: None,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[polling]\ninterval_seconds = 60").unwrap();

        assert!(cli(Some(temp_file.path().to_path_buf())).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        // Missing files are handled by falling back to defaults
        let cli = cli(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = TempDir::new().unwrap();
        assert!(cli(Some(dir.path().to_path_buf())).validate().is_err());
    }

    #[test]
    fn test_cli_validation_no_config() {
        assert!(cli(None).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_rejects_port_zero() {
        let mut cli = cli(None);
        cli.port = Some(0);
        assert!(cli.validate().is_err());

        cli.port = Some(9090);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = ["ddwatch", "--once", "-p", "9000", "-c", "ddwatch.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.once);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.config, Some(PathBuf::from("ddwatch.toml")));
        assert!(!cli.verbose);
    }

    #[tokio::test]
    async fn test_run_once_writes_report_for_empty_links() {
        let dir = TempDir::new().unwrap();
        let links_file = dir.path().join("links.json");
        std::fs::write(&links_file, "[]").unwrap();

        let mut config = Config::default();
        config.datadog.api_key = "api".to_string();
        config.datadog.app_key = "app".to_string();
        config.paths.data_dir = dir.path().join("data");
        config.paths.links_file = links_file;

        let mut cli = cli(None);
        cli.once = true;

        run(&cli, config.clone()).await.unwrap();
        assert!(config.paths.data_dir.join("errors.json").exists());
    }

    #[tokio::test]
    async fn test_run_once_fails_without_links_file() {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.datadog.api_key = "api".to_string();
        config.datadog.app_key = "app".to_string();
        config.paths.data_dir = dir.path().join("data");
        config.paths.links_file = dir.path().join("missing.json");

        let mut cli = cli(None);
        cli.once = true;

        assert!(run(&cli, config).await.is_err());
    }
}
