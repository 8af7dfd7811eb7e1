//! Two devices sharing one remote document

use std::time::Duration;

use blink_core::{
    EngineOptions, ItemMetadata, MemoryRemote, ReplicaStore, RetentionPolicy, SyncEngine,
};

fn device(remote: &MemoryRemote) -> SyncEngine {
    SyncEngine::new(
        ReplicaStore::in_memory().unwrap(),
        Some(Box::new(remote.device())),
        EngineOptions {
            retention: RetentionPolicy::from_days(2),
            debounce: Duration::from_millis(200),
        },
    )
}

#[tokio::test]
async fn test_star_propagates_between_devices() {
    let remote = MemoryRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);

    let meta = ItemMetadata::titled("Rust 2024", "https://blog.example.com/rust");
    phone.set_starred("rust", true, &meta).await.unwrap();
    assert!(phone.upload().await);

    assert!(laptop.pull().await);
    let doc = laptop.document().await.unwrap();
    let item = doc.get("rust").unwrap();
    assert!(item.starred);
    assert_eq!(item.metadata.title.as_deref(), Some("Rust 2024"));
    assert_eq!(laptop.starred_ids().await.unwrap(), vec!["rust".to_string()]);
}

#[tokio::test]
async fn test_later_unstar_wins_on_other_device() {
    let remote = MemoryRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);
    let meta = ItemMetadata::default();

    phone.set_starred("a", true, &meta).await.unwrap();
    assert!(phone.upload().await);
    assert!(laptop.pull().await);

    tokio::time::sleep(Duration::from_millis(5)).await;
    laptop.set_starred("a", false, &meta).await.unwrap();
    assert!(laptop.upload().await);

    assert!(phone.pull().await);
    assert!(phone.starred_ids().await.unwrap().is_empty());
    let item = phone.document().await.unwrap().get("a").cloned().unwrap();
    assert!(!item.starred);
    assert!(item.seen);
}

#[tokio::test]
async fn test_concurrent_edits_converge() {
    let remote = MemoryRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);
    let meta = ItemMetadata::default();

    // Both edit offline, then push in turn
    phone.set_starred("p", true, &meta).await.unwrap();
    phone.mark_seen("shared", &meta).await.unwrap();
    laptop.set_starred("l", true, &meta).await.unwrap();
    laptop.mark_seen("shared", &meta).await.unwrap();

    assert!(phone.upload().await);
    // Laptop's push re-bases on the phone's write
    assert!(laptop.upload().await);
    phone.pull().await;

    let mut phone_ids = phone.starred_ids().await.unwrap();
    let mut laptop_ids = laptop.starred_ids().await.unwrap();
    phone_ids.sort();
    laptop_ids.sort();
    assert_eq!(phone_ids, vec!["l".to_string(), "p".to_string()]);
    assert_eq!(phone_ids, laptop_ids);

    let published = remote.document().unwrap();
    assert_eq!(published.len(), 3);
    assert_eq!(remote.write_count(), 2);
}

#[tokio::test]
async fn test_debounced_push_reaches_other_device() {
    let remote = MemoryRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);
    let mut events = phone.subscribe_events();

    phone.toggle_star("x", &ItemMetadata::default()).await.unwrap();
    let event = events.recv().await.unwrap();
    assert!(event.is_success());
    assert_eq!(remote.write_count(), 1);

    assert!(laptop.pull().await);
    assert_eq!(laptop.starred_ids().await.unwrap(), vec!["x".to_string()]);
    phone.shutdown().await;
}

#[tokio::test]
async fn test_replica_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blink.db");
    let remote = MemoryRemote::new();

    {
        let engine = SyncEngine::new(
            ReplicaStore::open(&path).unwrap(),
            Some(Box::new(remote.device())),
            EngineOptions::default(),
        );
        engine.set_starred("kept", true, &ItemMetadata::default()).await.unwrap();
        assert!(engine.upload().await);
        engine.shutdown().await;
    }

    let engine = SyncEngine::new(
        ReplicaStore::open(&path).unwrap(),
        Some(Box::new(remote.device())),
        EngineOptions::default(),
    );
    assert_eq!(engine.starred_ids().await.unwrap(), vec!["kept".to_string()]);

    // Fresh handle has no version token, but merging our own write is a no-op
    assert!(engine.pull().await);
    assert_eq!(engine.document().await.unwrap().len(), 1);
}
