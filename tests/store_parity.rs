//! Backend Parity Tests
//!
//! Runs the same operation and sleep sequence against every local backend
//! and checks they agree. The TTL is whole seconds so the SQLite clock,
//! which only counts seconds, behaves like the others.

use std::sync::Arc;
use std::time::Duration;

use kvcache::config::Backend;
use kvcache::store::{self, Store};
use kvcache::{KvCache, ScriptValue};
use tempfile::TempDir;
use tokio_test::assert_ok;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(1);

fn local_backends(dir: &TempDir) -> Vec<Backend> {
    vec![
        Backend::Memory,
        Backend::Sqlite {
            path: dir.path().join("kv.db"),
        },
        Backend::JsonFile {
            path: dir.path().join("kv.json"),
        },
    ]
}

async fn open(backend: &Backend, shutdown: &CancellationToken) -> Arc<dyn Store> {
    store::open(backend, TTL, shutdown).await.unwrap()
}

/// Replays one sequence and records what each `get` observed.
async fn run_sequence(store: Arc<dyn Store>) -> Vec<Option<Vec<u8>>> {
    let mut observed = Vec::new();

    store.set("k", b"1").await.unwrap();
    observed.push(store.get("k").await.unwrap());
    observed.push(store.get("missing").await.unwrap());

    // Reads inside the window keep the key alive past the original TTL.
    sleep(Duration::from_millis(600)).await;
    observed.push(store.get("k").await.unwrap());
    sleep(Duration::from_millis(600)).await;
    observed.push(store.get("k").await.unwrap());

    sleep(Duration::from_millis(2200)).await;
    observed.push(store.get("k").await.unwrap());

    store.set("k", b"2").await.unwrap();
    observed.push(store.get("k").await.unwrap());

    // Overwriting resets the window: the key outlives its first write.
    store.set("r", b"old").await.unwrap();
    sleep(Duration::from_millis(700)).await;
    store.set("r", b"new").await.unwrap();
    sleep(Duration::from_millis(700)).await;
    observed.push(store.get("r").await.unwrap());

    observed
}

#[tokio::test]
async fn test_backends_agree_on_sliding_ttl() {
    let dir = TempDir::new().unwrap();
    let shutdown = CancellationToken::new();

    let expected = vec![
        Some(b"1".to_vec()),
        None,
        Some(b"1".to_vec()),
        Some(b"1".to_vec()),
        None,
        Some(b"2".to_vec()),
        Some(b"new".to_vec()),
    ];

    let mut runs = Vec::new();
    for backend in local_backends(&dir) {
        let store = open(&backend, &shutdown).await;
        runs.push(tokio::spawn(async move {
            let observed = run_sequence(store.clone()).await;
            store.close().await.unwrap();
            (backend.name(), observed)
        }));
    }

    for run in runs {
        let (name, observed) = run.await.unwrap();
        assert_eq!(observed, expected, "backend {} diverged", name);
    }
    shutdown.cancel();
}

#[tokio::test]
async fn test_backends_agree_on_script_values() {
    let dir = TempDir::new().unwrap();
    let shutdown = CancellationToken::new();

    let value = ScriptValue::dict([
        ("greeting", ScriptValue::from("hello")),
        ("count", ScriptValue::from(123)),
        ("ratio", ScriptValue::from(0.25)),
        (
            "pair",
            ScriptValue::Tuple(vec![ScriptValue::None, ScriptValue::Bool(false)]),
        ),
        (
            "point",
            ScriptValue::structure([("x", ScriptValue::from(1)), ("y", ScriptValue::from(-2))]),
        ),
    ]);

    for backend in local_backends(&dir) {
        let cache = KvCache::new(open(&backend, &shutdown).await);

        cache.set("v", &value).await.unwrap();
        assert_eq!(cache.get("v").await.unwrap(), value, "backend {}", backend.name());
        assert!(cache.get("nope").await.unwrap().is_none());

        let bad = ScriptValue::Dict(vec![(ScriptValue::from(1), ScriptValue::from("a"))]);
        assert!(cache.set("v", &bad).await.is_err());
        assert_eq!(cache.get("v").await.unwrap(), value);

        assert_ok!(cache.close().await);
    }
}

#[tokio::test]
async fn test_durable_backends_survive_restart() {
    let dir = TempDir::new().unwrap();
    let shutdown = CancellationToken::new();

    for backend in local_backends(&dir).into_iter().skip(1) {
        let cache = KvCache::new(open(&backend, &shutdown).await);
        cache.set("greeting", &ScriptValue::from("hello")).await.unwrap();
        cache.close().await.unwrap();

        let reopened = KvCache::new(open(&backend, &shutdown).await);
        assert_eq!(
            reopened.get("greeting").await.unwrap(),
            ScriptValue::from("hello"),
            "backend {}",
            backend.name()
        );
        reopened.close().await.unwrap();
    }
}
