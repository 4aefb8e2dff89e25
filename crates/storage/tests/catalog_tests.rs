//! Catalog registration across concurrent writers, local and remote.

use chrono::{TimeZone, Utc};
use object_store::memory::InMemory;
use std::sync::Arc;
use std::time::Duration;
use storage::{
    Catalog, CatalogEntry, CatalogError, CatalogLock, ObjectStorage, Registration, S3Uri,
};
use test_utils::scratch_dir;

fn entry(product: &str, minute: u32, location: &str) -> CatalogEntry {
    CatalogEntry::new(
        product,
        Utc.with_ymd_and_hms(2025, 7, 1, 12, minute, 0).unwrap(),
        vec![location.to_string()],
    )
}

// ============================================================================
// Local catalog
// ============================================================================

#[tokio::test]
async fn test_concurrent_registers_keep_both_entries() {
    let dir = scratch_dir();
    let path = dir.path().join("catalog.jsonl");
    let a = Catalog::local(&path);
    let b = Catalog::local(&path);

    let (ra, rb) = tokio::join!(
        a.register(entry("SRI", 0, "/out/SRI_202507011200.tif")),
        b.register(entry("VMI", 0, "/out/VMI_202507011200.tif")),
    );
    assert_eq!(ra.unwrap(), Registration::Registered);
    assert_eq!(rb.unwrap(), Registration::Registered);

    let entries = a.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    let mut products: Vec<_> = entries.iter().map(|e| e.product.as_str()).collect();
    products.sort();
    assert_eq!(products, vec!["SRI", "VMI"]);
}

#[tokio::test]
async fn test_concurrent_registers_across_tasks() {
    let dir = scratch_dir();
    let path = dir.path().join("catalog.jsonl");

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let catalog = Catalog::local(&path);
            tokio::spawn(async move {
                catalog
                    .register(entry("SRI", i * 5, &format!("/out/{}.tif", i)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Registration::Registered);
    }

    assert_eq!(Catalog::local(&path).entries().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_register_is_idempotent() {
    let dir = scratch_dir();
    let catalog = Catalog::local(dir.path().join("nested/catalog.jsonl"));

    let first = catalog.register(entry("SRI", 0, "/out/a.tif")).await.unwrap();
    let second = catalog.register(entry("SRI", 0, "/out/a.tif")).await.unwrap();
    assert_eq!(first, Registration::Registered);
    assert_eq!(second, Registration::AlreadyPresent);
    assert_eq!(catalog.entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lock_timeout_surfaces() {
    let dir = scratch_dir();
    let catalog = Catalog::local(dir.path().join("catalog.jsonl"))
        .with_lock_timeout(Duration::from_millis(200));

    let _held = CatalogLock::acquire(catalog.location().lock_path(), Duration::from_secs(1))
        .await
        .unwrap();
    let result = catalog.register(entry("SRI", 0, "/out/a.tif")).await;
    assert!(matches!(result, Err(CatalogError::LockTimeout { .. })));
}

#[tokio::test]
async fn test_corrupt_catalog_is_not_rewritten() {
    let dir = scratch_dir();
    let path = dir.path().join("catalog.jsonl");
    std::fs::write(&path, "this is not json\n").unwrap();

    let result = Catalog::local(&path).register(entry("SRI", 0, "/out/a.tif")).await;
    assert!(matches!(result, Err(CatalogError::Corrupt { line: 1, .. })));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "this is not json\n");
}

// ============================================================================
// Remote catalog
// ============================================================================

#[tokio::test]
async fn test_remote_catalog_roundtrip() {
    let store = ObjectStorage::from_store(Arc::new(InMemory::new()), "radar");
    let uri: S3Uri = "s3://radar/catalog/catalog-remote-test.jsonl".parse().unwrap();
    let catalog = Catalog::remote(uri.clone(), store.clone());

    let registered = catalog
        .register(entry("SRI", 0, "s3://radar/data/SRI_202507011200.tif"))
        .await
        .unwrap();
    assert_eq!(registered, Registration::Registered);

    let raw = store.get(&uri.key).await.unwrap();
    let text = String::from_utf8(raw.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("\"product\":\"SRI\""));

    let again = catalog
        .register(entry("SRI", 0, "s3://radar/data/SRI_202507011200.tif"))
        .await
        .unwrap();
    assert_eq!(again, Registration::AlreadyPresent);
}
