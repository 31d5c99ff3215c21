mod common;

use common::{eventually, fast_config, status_runner, Behavior, ScriptedSource};
use lib_sources::routing::{route, Request, REMOTE_DESTINATION_KEY};
use lib_sources::Source;
use serde_json::json;

fn ids(remote: &[std::sync::Arc<dyn Source>]) -> Vec<String> {
    remote.iter().map(|source| source.id().expect("readable id")).collect()
}

#[tokio::test(start_paused = true)]
async fn requests_fan_out_to_available_sources_only() {
    let (runner, _observer) = status_runner(fast_config());
    let north = ScriptedSource::new("north", Behavior::Up);
    let south = ScriptedSource::new("south", Behavior::Down);
    let east = ScriptedSource::new("east", Behavior::Up);
    for source in [&north, &south, &east] {
        runner.bind(source.handle());
    }
    eventually(|| runner.snapshot().iter().all(|(_, cached)| cached.is_some())).await;

    let everywhere = route(&runner, &Request::new().enterprise(true));
    assert!(everywhere.include_local);
    assert_eq!(ids(&everywhere.remote), vec!["north", "east"]);

    let targeted = route(
        &runner,
        &Request::new().targeting(["south", "east", "west"]),
    );
    assert_eq!(ids(&targeted.remote), vec!["east"]);

    let remote_only = route(
        &runner,
        &Request::new()
            .with_property(REMOTE_DESTINATION_KEY, json!(true))
            .targeting(["north"]),
    );
    assert!(!remote_only.include_local);
    assert_eq!(ids(&remote_only.remote), vec!["north"]);
}

#[tokio::test(start_paused = true)]
async fn plain_request_stays_local() {
    let (runner, _observer) = status_runner(fast_config());
    let north = ScriptedSource::new("north", Behavior::Up);
    runner.bind(north.handle());
    eventually(|| runner.is_available(north.as_ref())).await;

    let plain = route(&runner, &Request::new());
    assert!(plain.include_local);
    assert!(plain.remote.is_empty());
}
