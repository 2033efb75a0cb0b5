use super::DeadLetterStore;

use tempfile::{TempDir, tempdir};

fn create_test_store(max: Option<usize>) -> (DeadLetterStore, TempDir) {
    let dir = tempdir().unwrap();
    let store = DeadLetterStore::open(dir.path().to_str().unwrap(), max).unwrap();
    (store, dir)
}

#[test]
fn test_record_and_load_dead_letter() {
    let (store, _dir) = create_test_store(None);

    store
        .record("orders", br#"{"txid":"1"}"#, "leader not available", 3)
        .unwrap();
    let letters = store.load("orders").unwrap();

    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].topic, "orders");
    assert_eq!(letters[0].payload, r#"{"txid":"1"}"#);
    assert_eq!(letters[0].reason, "leader not available");
    assert_eq!(letters[0].attempts, 3);
    assert!(letters[0].failed_at > 0);
}

#[test]
fn test_load_preserves_failure_order() {
    let (store, _dir) = create_test_store(None);

    for i in 0..5 {
        store.record("orders", format!("msg{i}").as_bytes(), "closed", 1).unwrap();
    }

    let payloads: Vec<_> = store
        .load("orders")
        .unwrap()
        .into_iter()
        .map(|l| l.payload)
        .collect();
    assert_eq!(payloads, vec!["msg0", "msg1", "msg2", "msg3", "msg4"]);
}

#[test]
fn test_max_per_topic_drops_oldest() {
    let (store, _dir) = create_test_store(Some(3));

    for i in 0..5 {
        store.record("orders", format!("msg{i}").as_bytes(), "closed", 1).unwrap();
    }

    let payloads: Vec<_> = store
        .load("orders")
        .unwrap()
        .into_iter()
        .map(|l| l.payload)
        .collect();
    assert_eq!(payloads, vec!["msg2", "msg3", "msg4"]);
    assert_eq!(store.count("orders").unwrap(), 3);
}

#[test]
fn test_topics_are_kept_apart() {
    let (store, _dir) = create_test_store(None);

    store.record("orders", b"a", "closed", 1).unwrap();
    store.record("returns", b"b", "closed", 1).unwrap();

    assert_eq!(store.count("orders").unwrap(), 1);
    assert_eq!(store.count("returns").unwrap(), 1);
    assert_eq!(store.count("unknown").unwrap(), 0);
    assert_eq!(store.load("returns").unwrap()[0].payload, "b");
}
