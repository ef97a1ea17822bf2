mod support;

use std::sync::Arc;
use std::time::Duration;

use coin_common::{CoinError, InstrumentSnapshot, WatchListStore};
use coin_relay::{FetchLoop, Provider, Transport};
use crossbeam_channel::{Receiver, bounded};

use support::{FakeProvider, Reply, StaticStore, market_json};

fn fetch_loop(
    provider: &FakeProvider,
    store: Arc<dyn WatchListStore>,
) -> (FetchLoop, Receiver<coin_common::EncodedMessage>) {
    let (tx, rx) = bounded(64);
    let fetch = FetchLoop::new(
        store,
        Arc::new(Transport::new(Duration::from_secs(5)).unwrap()),
        Provider::new(&provider.url, "usd").unwrap(),
        tx,
        Duration::from_millis(10),
    );
    (fetch, rx)
}

fn forwarded_ids(rx: &Receiver<coin_common::EncodedMessage>) -> Vec<String> {
    rx.try_iter()
        .map(|m| InstrumentSnapshot::decode(m.as_bytes()).unwrap().id)
        .collect()
}

#[test]
fn only_watched_snapshots_are_forwarded_in_stream_order() {
    let provider = FakeProvider::start(Reply::Frames(vec![
        format!("[{},{}]", market_json("ethereum", 3000.0), market_json("bitcoin", 60000.0)),
        format!("[{},{}]", market_json("dogecoin", 0.1), market_json("solana", 150.0)),
    ]));
    let store = Arc::new(StaticStore::new(&["bitcoin", "ethereum", "solana"], Arc::default()));
    let (fetch, rx) = fetch_loop(&provider, store);

    let report = fetch.run_cycle().unwrap();
    assert_eq!(report.decoded, 4);
    assert_eq!(report.forwarded, 3);
    assert_eq!(report.filtered, 1);
    assert!(!report.truncated);
    assert_eq!(forwarded_ids(&rx), ["ethereum", "bitcoin", "solana"]);

    let target = provider.requests.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        target,
        "/api/v3/coins/markets?ids=bitcoin%2Cethereum%2Csolana&vs_currency=usd&sparkline=true\
         &price_change_percentage=1h%2C24h%2C7d%2C30d%2C1y"
    );
}

#[test]
fn malformed_frame_keeps_what_was_already_decoded() {
    let provider = FakeProvider::start(Reply::Frames(vec![
        format!("[{}]", market_json("bitcoin", 60000.0)),
        r#"[{"id":"ethereum","symbol":"#.to_string(),
        format!("[{}]", market_json("solana", 150.0)),
    ]));
    let store = Arc::new(StaticStore::new(&["bitcoin", "ethereum", "solana"], Arc::default()));
    let (fetch, rx) = fetch_loop(&provider, store);

    let report = fetch.run_cycle().unwrap();
    assert!(report.truncated);
    assert_eq!(forwarded_ids(&rx), ["bitcoin"]);
}

#[test]
fn empty_watch_list_skips_the_request() {
    let provider = FakeProvider::start(Reply::Frames(vec!["[]".to_string()]));
    let store = Arc::new(StaticStore::new(&[], Arc::default()));
    let (fetch, rx) = fetch_loop(&provider, store);

    let report = fetch.run_cycle().unwrap();
    assert_eq!(report.forwarded, 0);
    assert!(rx.is_empty());
    assert!(provider.requests.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn closed_store_fails_the_cycle() {
    let provider = FakeProvider::start(Reply::Frames(vec!["[]".to_string()]));
    let store = Arc::new(StaticStore::new(&["bitcoin"], Arc::default()));
    store.close().unwrap();
    let (fetch, _rx) = fetch_loop(&provider, store);

    assert!(matches!(fetch.run_cycle(), Err(CoinError::StoreClosed)));
}

#[test]
fn unreachable_provider_is_skipped_and_loop_keeps_running() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (tx, _rx) = bounded(8);
    let fetch = FetchLoop::new(
        Arc::new(StaticStore::new(&["bitcoin"], Arc::default())),
        Arc::new(Transport::new(Duration::from_secs(1)).unwrap()),
        Provider::new(&url, "usd").unwrap(),
        tx,
        Duration::from_millis(10),
    );
    let (stop_tx, stop_rx) = bounded(1);
    let worker = fetch.spawn(stop_rx).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    stop_tx.send(()).unwrap();

    let done = worker.wait().unwrap();
    assert_eq!(done.signals, 1);
    assert!(done.output.cycles >= 2);
    assert_eq!(done.output.skipped, done.output.cycles);
    assert_eq!(done.output.forwarded, 0);
}
