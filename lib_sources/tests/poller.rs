use std::sync::Arc;
use std::time::Duration;

use lib_sources::core::{CheckFailure, CheckKind, CheckOutcome, Registry};
use lib_sources::{Dispatch, PollEvent, Poller, RecordingObserver, WorkerPool};

/// Counts how long a probe's answer is, or records why it had none.
struct LengthCheck;

impl CheckKind for LengthCheck {
    type Output = String;
    type Value = Result<usize, String>;

    fn name(&self) -> &'static str {
        "length"
    }

    fn on_value(&self, output: String) -> Self::Value {
        Ok(output.len())
    }

    fn on_timeout(&self) -> Self::Value {
        Err("timeout".to_string())
    }

    fn on_failure(&self, failure: &CheckFailure) -> Self::Value {
        Err(failure.to_string())
    }
}

fn poller(timeout: Duration) -> (Poller<String, LengthCheck>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let pool = WorkerPool::on_current_runtime(4).expect("pool");
    let registry = Arc::new(Registry::new());
    let poller = Poller::new(LengthCheck, registry, pool, timeout, observer.clone());
    (poller, observer)
}

#[tokio::test(start_paused = true)]
async fn unregistered_key_is_a_no_op() {
    let (poller, observer) = poller(Duration::from_secs(1));
    let dispatch = poller.check_status(&"nobody".to_string(), async { Ok("x".to_string()) });

    assert!(matches!(dispatch, Dispatch::Unknown));
    assert!(poller.cached_value(&"nobody".to_string()).is_none());
    assert!(observer.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completed_value_is_published() {
    let (poller, _observer) = poller(Duration::from_secs(1));
    let key = "words".to_string();
    poller.registry().register(key.clone());

    let handle = match poller.check_status(&key, async { Ok("hello".to_string()) }) {
        Dispatch::Started(handle) => handle,
        other => panic!("not started: {:?}", other),
    };
    assert_eq!(handle.wait().await, Some(CheckOutcome::Completed(Ok(5))));
    assert_eq!(poller.cached_value(&key), Some(Ok(5)));
    assert_eq!(poller.registry().is_checking(&key), Some(false));
}

#[tokio::test(start_paused = true)]
async fn second_check_is_skipped_while_the_first_runs() {
    let (poller, observer) = poller(Duration::from_secs(10));
    let key = "slow".to_string();
    poller.registry().register(key.clone());

    let first = poller.check_status(&key, async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok("done".to_string())
    });
    let second = poller.check_status(&key, async { Ok("never".to_string()) });

    assert!(first.is_started());
    assert!(matches!(second, Dispatch::Busy));
    assert_eq!(observer.count(|e| matches!(e, PollEvent::CheckSkipped { .. })), 1);

    if let Dispatch::Started(handle) = first {
        handle.wait().await;
    }
    assert_eq!(poller.cached_value(&key), Some(Ok(4)));
}

#[tokio::test(start_paused = true)]
async fn timeout_and_error_are_classified_by_the_kind() {
    let (poller, _observer) = poller(Duration::from_millis(100));
    let key = "bad".to_string();
    poller.registry().register(key.clone());

    let timed_out = match poller.check_status(&key, std::future::pending::<anyhow::Result<String>>()) {
        Dispatch::Started(handle) => handle.wait().await,
        other => panic!("not started: {:?}", other),
    };
    assert_eq!(timed_out, Some(CheckOutcome::TimedOut(Err("timeout".to_string()))));
    assert_eq!(poller.cached_value(&key), Some(Err("timeout".to_string())));

    let failed = match poller.check_status(&key, async { Err(anyhow::anyhow!("no route to host")) }) {
        Dispatch::Started(handle) => handle.wait().await,
        other => panic!("not started: {:?}", other),
    };
    let expected = Err("probe error: no route to host".to_string());
    assert_eq!(
        failed,
        Some(CheckOutcome::Failed {
            value: expected.clone(),
            failure: CheckFailure::Error("no route to host".to_string()),
        })
    );
    assert_eq!(poller.cached_value(&key), Some(expected));
}

#[tokio::test(start_paused = true)]
async fn throttled_check_respects_the_minimum_interval() {
    let (poller, observer) = poller(Duration::from_secs(1));
    let key = "eager".to_string();
    poller.registry().register(key.clone());

    if let Dispatch::Started(handle) = poller.check_status(&key, async { Ok("a".to_string()) }) {
        handle.wait().await;
    }

    let refused = poller.check_status_throttled(&key, Duration::from_secs(5), async { Ok("bb".to_string()) });
    assert!(matches!(refused, Dispatch::Throttled));
    assert_eq!(observer.count(|e| matches!(e, PollEvent::RecheckThrottled { .. })), 1);
    assert_eq!(poller.cached_value(&key), Some(Ok(1)));

    tokio::time::advance(Duration::from_secs(5)).await;
    match poller.check_status_throttled(&key, Duration::from_secs(5), async { Ok("bb".to_string()) }) {
        Dispatch::Started(handle) => {
            handle.wait().await;
        }
        other => panic!("not started: {:?}", other),
    }
    assert_eq!(poller.cached_value(&key), Some(Ok(2)));
}
