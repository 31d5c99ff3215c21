//! # TCP Probe Live Test
//!
//! Binds a `TcpSource` pointed at a local listener, checks that it reads as
//! available, closes the listener and checks that it then reads as
//! unavailable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use lib_sources::loggers::setup_logging;
use lib_sources::probes::TcpSource;
use lib_sources::{Dispatch, SourceKey, PollerConfig, Source, SourceStatus, StatusCheck, StatusSourcePoller};
use tokio::net::TcpListener;

/// Waits until no check is running for `source`.
async fn wait_settled(poller: &StatusSourcePoller, source: &dyn Source) -> Result<()> {
    let key = SourceKey::of(source);
    for _ in 0..300 {
        if poller.registry().is_checking(&key) == Some(false) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("check for {} did not finish in time", key)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = tempfile::tempdir()?;
    setup_logging("test_tcp_probe", log_dir.path(), log::LevelFilter::Debug)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    println!("[*] Listening on {}", address);

    // min_recheck_secs = 0 so consecutive rechecks are never throttled.
    let config = PollerConfig {
        check_timeout_ms: 2_000,
        min_recheck_secs: 0,
        ..PollerConfig::default()
    };
    let poller = StatusSourcePoller::on_current_runtime(StatusCheck, config)?;

    let source: Arc<dyn Source> = Arc::new(TcpSource::new("local", address.clone()));
    poller.bind(Arc::clone(&source));

    // bind() has already dispatched the first check.
    wait_settled(&poller, source.as_ref()).await?;
    let status = poller.get_status(source.as_ref());
    if status != SourceStatus::Available {
        bail!("expected AVAILABLE while listening, got {}", status);
    }
    println!("[SUCCESS] {} is {}", address, status);

    drop(listener);

    let handle = match poller.recheck_availability(&source) {
        Dispatch::Started(handle) => handle,
        other => bail!("recheck was not started: {:?}", other),
    };
    println!("[*] Recheck: {:?}", handle.wait().await);
    let status = poller.get_status(source.as_ref());
    if status != SourceStatus::Unavailable {
        bail!("expected UNAVAILABLE after close, got {}", status);
    }
    println!("[SUCCESS] {} is {}", address, status);

    poller.shutdown().await;
    Ok(())
}
