//! # Source Monitor
//!
//! Polls a list of TCP and HTTP endpoints and prints their availability at a
//! fixed interval until interrupted.
//!
//! Poller timing comes from the layered JSON configuration (see
//! `lib_sources::configs::config_layered`); command line flags and their
//! environment variables override it. Endpoints are listed in a JSON file:
//!
//! ```json
//! { "sources": [
//!     { "kind": "tcp", "id": "dns", "address": "1.1.1.1:53" },
//!     { "kind": "http", "id": "web", "url": "https://example.com", "title": "Example" }
//! ] }
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info, warn};
use serde::Deserialize;

use lib_sources::configs::config_layered::config_dir;
use lib_sources::loggers::{parse_level, setup_logging};
use lib_sources::probes::{HttpSource, TcpSource};
use lib_sources::{PollerConfig, Source, SourceKey, StatusCheck, StatusSourcePoller};

const APP_NAME: &str = "monitor_sources";

#[derive(Parser, Debug, Clone)]
#[clap(about = "Polls TCP and HTTP endpoints and reports their availability", version)]
struct Args {
    #[clap(long, env = "MONITOR_SOURCES_FILE", default_value = "monitor_sources.json", help = "JSON file listing the endpoints to poll.")]
    sources_file: PathBuf,

    #[clap(long, env = "MONITOR_CONFIG_DIR", default_value = "./configs", help = "Directory holding the layered JSON configuration.")]
    config_dir: PathBuf,

    #[clap(long, env = "MONITOR_MODE", help = "Running mode, selects monitor_sources.<mode>.json.")]
    mode: Option<String>,

    #[clap(long, env = "MONITOR_LOG_DIR", default_value = "./logs", help = "Directory for log files.")]
    log_dir: PathBuf,

    #[clap(long, env = "MONITOR_LOG_LEVEL", default_value = "info", help = "Logging level (trace, debug, info, warn, error, fatal).")]
    log_level: String,

    #[clap(long, env = "MONITOR_INTERVAL_SECS", help = "Seconds between poll cycles.")]
    interval_secs: Option<u64>,

    #[clap(long, env = "MONITOR_TIMEOUT_MS", help = "Milliseconds a single probe may run.")]
    timeout_ms: Option<u64>,

    #[clap(long, env = "MONITOR_REPORT_SECS", default_value_t = 10, help = "Seconds between status reports.")]
    report_secs: u64,
}

#[derive(Deserialize, Debug)]
struct SourcesFile {
    sources: Vec<Endpoint>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Endpoint {
    Tcp {
        id: String,
        address: String,
        title: Option<String>,
    },
    Http {
        id: String,
        url: String,
        title: Option<String>,
    },
}

impl Endpoint {
    fn into_source(self) -> Result<Arc<dyn Source>> {
        let source: Arc<dyn Source> = match self {
            Endpoint::Tcp { id, address, title } => {
                let source = TcpSource::new(id, address);
                Arc::new(match title {
                    Some(title) => source.with_title(title),
                    None => source,
                })
            }
            Endpoint::Http { id, url, title } => {
                let source = HttpSource::new(id, &url)?;
                Arc::new(match title {
                    Some(title) => source.with_title(title),
                    None => source,
                })
            }
        };
        Ok(source)
    }
}

fn load_sources(path: &PathBuf) -> Result<Vec<Arc<dyn Source>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file {}", path.display()))?;
    let file: SourcesFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse sources file {}", path.display()))?;
    file.sources.into_iter().map(Endpoint::into_source).collect()
}

fn load_poller_config(args: &Args) -> Result<PollerConfig> {
    let dir = config_dir(&args.config_dir);
    let mut config = PollerConfig::load(&dir, APP_NAME, args.mode.as_deref())?;
    if let Some(interval) = args.interval_secs {
        config.interval_secs = interval;
    }
    if let Some(timeout) = args.timeout_ms {
        config.check_timeout_ms = timeout;
    }
    config.validate()?;
    Ok(config)
}

/// Binds every source, returning the keys skipped as duplicates.
fn bind_sources(poller: &StatusSourcePoller, sources: Vec<Arc<dyn Source>>) -> Vec<SourceKey> {
    let mut skipped = Vec::new();
    for source in sources {
        let key = SourceKey::of(source.as_ref());
        if !poller.bind(source) {
            warn!("Skipping duplicate source {}", key);
            skipped.push(key);
        }
    }
    skipped
}

fn print_report(poller: &StatusSourcePoller) {
    println!("--- {} ---", Local::now().format("%Y-%m-%d %H:%M:%S"));
    for (key, cached) in poller.snapshot() {
        match cached {
            Some(cached) => println!(
                "{:<32} {:<12} {}",
                key.to_string(),
                cached.status().as_str(),
                cached.timestamp().with_timezone(&Local).format("%H:%M:%S")
            ),
            None => println!("{:<32} {:<12} -", key.to_string(), "UNKNOWN"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_path = setup_logging(APP_NAME, &args.log_dir, parse_level(&args.log_level))
        .context("Failed to initialize logging")?;
    info!("Logging to {}", log_path.display());

    let config = load_poller_config(&args)?;
    info!("Poller configuration: {}", config);

    let sources = load_sources(&args.sources_file)?;
    if sources.is_empty() {
        warn!("No sources listed in {}", args.sources_file.display());
    }

    let poller = StatusSourcePoller::on_current_runtime(StatusCheck, config)?;
    bind_sources(&poller, sources);
    poller.start()?;

    let mut report = tokio::time::interval(Duration::from_secs(args.report_secs.max(1)));
    loop {
        tokio::select! {
            _ = report.tick() => print_report(&poller),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down...");
    if !poller.shutdown().await {
        warn!("Some checks did not finish before shutdown");
    }
    print_report(&poller);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_endpoints_are_skipped_by_key() {
        let poller =
            StatusSourcePoller::on_current_runtime(StatusCheck, PollerConfig::default()).expect("poller");
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(TcpSource::new("db", "127.0.0.1:1")),
            Arc::new(TcpSource::new("db", "127.0.0.1:1")),
            Arc::new(TcpSource::new("cache", "127.0.0.1:2")),
        ];

        let skipped = bind_sources(&poller, sources);

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id(), Some("db"));
        assert_eq!(poller.len(), 2);
        poller.shutdown().await;
    }
}
