//! Checkpoint and snapshot tests

use docpkg_core::{checkpoint, deploy, snapshot, CoreError, DeployOptions};
use docpkg_model::{DigestBuilder, DocumentKey, OperationType, PartitionKeyValue, Profile};
use docpkg_test_utils::{read_package, write_package, MemoryStore, PartitionSpec, ACCOUNT_ADDRESS};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_container("shop", "items", &["/pk"])
        .with_container("shop", "orders", &["/customer"])
}

fn key(id: &str, pk: &str) -> DocumentKey {
    DocumentKey::new("shop", "items", id, PartitionKeyValue::single(pk))
}

#[tokio::test]
async fn test_checkpoint_restores_upserted_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    store.seed("shop", "items", json!({"id": "1", "pk": "a", "v": 1}));
    let source = write_package(
        &dir.path().join("src.zip"),
        &[PartitionSpec::new("shop", "items", OperationType::Upsert, vec![json!({"id": "1", "pk": "a", "v": 2})])],
    );
    let rollback = dir.path().join("rollback.zip");

    let report = checkpoint(&[source], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.captured, 1);
    assert_eq!(report.rollback_count(), 1);

    let partitions = read_package(&rollback);
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].0.operation(), OperationType::Upsert);
    assert_eq!(partitions[0].1, vec![json!({"id": "1", "pk": "a", "v": 1})]);
}

#[tokio::test]
async fn test_checkpoint_create_over_absent_becomes_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let source = write_package(
        &dir.path().join("src.zip"),
        &[PartitionSpec::new("shop", "items", OperationType::Create, vec![json!({"id": "2", "pk": "a"})])],
    );
    let rollback = dir.path().join("rollback.zip");
    checkpoint(&[source], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();

    let partitions = read_package(&rollback);
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].0.operation(), OperationType::Delete);
    assert_eq!(partitions[0].1, vec![json!({"id": "2", "pk": "a"})]);
}

#[tokio::test]
async fn test_checkpoint_equal_upsert_has_no_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    store.seed("shop", "items", json!({"id": "1", "pk": "a", "v": 1}));
    let source = write_package(
        &dir.path().join("src.zip"),
        &[PartitionSpec::new("shop", "items", OperationType::Upsert, vec![json!({"v": 1, "pk": "a", "id": "1"})])],
    );
    let rollback = dir.path().join("rollback.zip");
    let report = checkpoint(&[source], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.rollback_count(), 0);
    assert!(read_package(&rollback).is_empty());
}

#[tokio::test]
async fn test_checkpoint_properties_fingerprint_observed_etags() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    store.seed("shop", "items", json!({"id": "1", "pk": "a"}));
    store.seed("shop", "items", json!({"id": "2", "pk": "a"}));
    let source = write_package(
        &dir.path().join("src.zip"),
        &[PartitionSpec::new(
            "shop",
            "items",
            OperationType::Delete,
            vec![json!({"id": "1", "pk": "a"}), json!({"id": "2", "pk": "a"}), json!({"id": "3", "pk": "a"})],
        )],
    );
    let rollback = dir.path().join("rollback.zip");
    let report = checkpoint(&[source], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();

    let mut digest = DigestBuilder::new();
    for k in [key("1", "a"), key("2", "a")] {
        digest.update(store.get(&k).unwrap().etag().unwrap());
    }
    assert_eq!(report.properties.version, Some(digest.finish().to_string()));
    assert_eq!(report.properties.subject.as_deref(), Some(ACCOUNT_ADDRESS));
    assert!(report.properties.identifier.is_some());
    assert_eq!(report.captured, 3);
    assert_eq!(report.rollback_count(), 2);
}

#[tokio::test]
async fn test_checkpoint_groups_are_sorted_across_containers() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    store.seed("shop", "orders", json!({"id": "o1", "customer": "c1", "total": 5}));
    store.seed("shop", "items", json!({"id": "i1", "pk": "a", "v": 1}));
    let source = write_package(
        &dir.path().join("src.zip"),
        &[
            PartitionSpec::new("shop", "orders", OperationType::Delete, vec![json!({"id": "o1", "customer": "c1"})]),
            PartitionSpec::new("shop", "items", OperationType::Upsert, vec![
                json!({"id": "i9", "pk": "b"}),
                json!({"id": "i1", "pk": "a", "v": 2}),
            ]),
        ],
    );
    let rollback = dir.path().join("rollback.zip");
    checkpoint(&[source], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();

    let layout: Vec<_> = read_package(&rollback)
        .into_iter()
        .map(|(p, docs)| (p.container().to_string(), p.operation(), docs))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("items".to_string(), OperationType::Delete, vec![json!({"id": "i9", "pk": "b"})]),
            ("items".to_string(), OperationType::Upsert, vec![json!({"id": "i1", "pk": "a", "v": 1})]),
            ("orders".to_string(), OperationType::Upsert, vec![json!({"id": "o1", "customer": "c1", "total": 5})]),
        ]
    );
}

#[tokio::test]
async fn test_checkpoint_then_rollback_restores_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    store.seed("shop", "items", json!({"id": "1", "pk": "a", "v": 1, "tag": "x"}));
    store.seed("shop", "items", json!({"id": "2", "pk": "a"}));
    let source = write_package(
        &dir.path().join("src.zip"),
        &[
            PartitionSpec::new("shop", "items", OperationType::Patch, vec![json!({"id": "1", "pk": "a", "v": 7})]),
            PartitionSpec::new("shop", "items", OperationType::Delete, vec![json!({"id": "2", "pk": "a"})]),
            PartitionSpec::new("shop", "items", OperationType::Create, vec![json!({"id": "3", "pk": "a"})]),
        ],
    );
    let rollback = dir.path().join("rollback.zip");
    checkpoint(&[source.clone()], &rollback, &store, CancellationToken::new())
        .await
        .unwrap();

    deploy(&[source], &store, &DeployOptions::new(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.get_stripped(&key("1", "a")).unwrap()["v"], 7);
    assert!(store.get(&key("2", "a")).is_none());
    assert!(store.get(&key("3", "a")).is_some());

    deploy(&[rollback], &store, &DeployOptions::new(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        store.get_stripped(&key("1", "a")),
        Some(json!({"id": "1", "pk": "a", "v": 1, "tag": "x"}))
    );
    assert_eq!(store.get_stripped(&key("2", "a")), Some(json!({"id": "2", "pk": "a"})));
    assert!(store.get(&key("3", "a")).is_none());
}

#[tokio::test]
async fn test_checkpoint_duplicate_entry_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let spec = || {
        vec![PartitionSpec::new("shop", "items", OperationType::Upsert, vec![json!({"id": "1", "pk": "a"})])]
    };
    let a = write_package(&dir.path().join("a.zip"), &spec());
    let b = write_package(&dir.path().join("b.zip"), &spec());
    let rollback = dir.path().join("rollback.zip");

    let err = checkpoint(&[a, b], &rollback, &store, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateDeployEntry { .. }));
    assert!(!rollback.exists());
}

#[tokio::test]
async fn test_snapshot_captures_profile_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let b = store.seed("shop", "items", json!({"id": "b", "pk": "a", "v": 2}));
    let a = store.seed("shop", "items", json!({"id": "a", "pk": "z", "v": 1}));
    let order = store.seed("shop", "orders", json!({"id": "o", "customer": "c"}));
    let missing = key("missing", "a");

    let profile = Profile::new(vec![order.clone(), b.clone(), missing, a.clone(), b.clone()]);
    let output = dir.path().join("snap.zip");
    let report = snapshot(&profile, &output, &store, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.missing, 1);
    assert_eq!(report.document_count(), 3);
    assert_eq!(report.properties.subject.as_deref(), Some(ACCOUNT_ADDRESS));

    let mut digest = DigestBuilder::new();
    for k in [&a, &b, &order] {
        digest.update(store.get(k).unwrap().etag().unwrap());
    }
    assert_eq!(report.properties.version, Some(digest.finish().to_string()));

    let layout: Vec<_> = read_package(&output)
        .into_iter()
        .map(|(p, docs)| (p.container().to_string(), p.operation(), docs))
        .collect();
    assert_eq!(
        layout,
        vec![
            (
                "items".to_string(),
                OperationType::Upsert,
                vec![json!({"id": "a", "pk": "z", "v": 1}), json!({"id": "b", "pk": "a", "v": 2})]
            ),
            ("orders".to_string(), OperationType::Upsert, vec![json!({"id": "o", "customer": "c"})]),
        ]
    );
}

#[tokio::test]
async fn test_snapshot_cancelled_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let k = store.seed("shop", "items", json!({"id": "1", "pk": "a"}));
    let output = dir.path().join("snap.zip");
    let token = CancellationToken::new();
    token.cancel();

    let err = snapshot(&Profile::new(vec![k]), &output, &store, token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!output.exists());
}
