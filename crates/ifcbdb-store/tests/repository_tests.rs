//! Integration tests for SqliteDatasetStore
//!
//! These tests exercise every IDatasetStore method against an in-memory
//! SQLite database. Each test creates a fresh database.

use chrono::{Duration, TimeZone, Utc};

use ifcbdb_core::domain::{
    Bin, BinMetrics, DataDirectory, Dataset, DirectoryKind, Location, Pid, FILL_VALUE,
};
use ifcbdb_core::ports::{BinQuery, IDatasetStore};
use ifcbdb_store::{DatabasePool, SqliteDatasetStore};

// ============================================================================
// Test helpers
// ============================================================================

/// Create a fresh in-memory store for each test
async fn setup() -> SqliteDatasetStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteDatasetStore::new(pool.pool().clone())
}

async fn create_dataset(store: &SqliteDatasetStore, name: &str) -> Dataset {
    let dataset = Dataset::new(name, format!("{name} title")).unwrap();
    store.save_dataset(&dataset).await.unwrap();
    dataset
}

fn bin(pid: &str) -> Bin {
    Bin::new(Pid::new(pid).unwrap())
}

fn pid(s: &str) -> Pid {
    Pid::new(s).unwrap()
}

// ============================================================================
// Datasets
// ============================================================================

#[tokio::test]
async fn test_save_and_get_dataset() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;

    let by_id = store.get_dataset(dataset.id()).await.unwrap().unwrap();
    assert_eq!(by_id, dataset);

    let by_name = store.get_dataset_by_name("mvco").await.unwrap().unwrap();
    assert_eq!(by_name.id(), dataset.id());

    assert!(store.get_dataset_by_name("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_dataset_updates_in_place() {
    let store = setup().await;
    let mut dataset = create_dataset(&store, "mvco").await;
    dataset.set_title("Martha's Vineyard");
    dataset.set_active(false);
    store.save_dataset(&dataset).await.unwrap();

    let loaded = store.get_dataset(dataset.id()).await.unwrap().unwrap();
    assert_eq!(loaded.title(), "Martha's Vineyard");
    assert!(!loaded.is_active());
    assert_eq!(store.list_datasets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dataset_names_are_unique() {
    let store = setup().await;
    create_dataset(&store, "mvco").await;
    let duplicate = Dataset::new("mvco", "again").unwrap();
    assert!(store.save_dataset(&duplicate).await.is_err());
}

#[tokio::test]
async fn test_list_datasets_sorted_by_name() {
    let store = setup().await;
    create_dataset(&store, "zeta").await;
    create_dataset(&store, "alpha").await;

    let names: Vec<_> = store
        .list_datasets()
        .await
        .unwrap()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

// ============================================================================
// Directories
// ============================================================================

#[tokio::test]
async fn test_directories_ordered_by_priority() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;

    let low = DataDirectory::new(*dataset.id(), "/data/archive")
        .unwrap()
        .with_priority(2);
    let high = DataDirectory::new(*dataset.id(), "/data/live")
        .unwrap()
        .with_priority(1)
        .with_blacklist("skip,bad,old");
    let derived = DataDirectory::new(*dataset.id(), "/data/products")
        .unwrap()
        .with_kind(DirectoryKind::Derived)
        .with_priority(0);
    for d in [&low, &high, &derived] {
        store.save_directory(d).await.unwrap();
    }

    let raw = store
        .list_directories(dataset.id(), Some(DirectoryKind::Raw))
        .await
        .unwrap();
    let paths: Vec<_> = raw.iter().map(|d| d.path().to_path_buf()).collect();
    assert_eq!(paths, vec![high.path().to_path_buf(), low.path().to_path_buf()]);
    assert_eq!(raw[0].blacklist(), &["skip", "bad", "old"]);

    let all = store.list_directories(dataset.id(), None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].kind(), DirectoryKind::Derived);
}

#[tokio::test]
async fn test_mark_directory_synced() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;
    let dir = DataDirectory::new(*dataset.id(), "/data/live").unwrap();
    store.save_directory(&dir).await.unwrap();

    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    store.mark_directory_synced(dir.id(), at).await.unwrap();

    let loaded = store.get_directory(dir.id()).await.unwrap().unwrap();
    assert_eq!(loaded.last_synced(), Some(at));
}

#[tokio::test]
async fn test_mark_unknown_directory_fails() {
    let store = setup().await;
    let dir = DataDirectory::new(ifcbdb_core::domain::DatasetId::new(), "/x").unwrap();
    assert!(store.mark_directory_synced(dir.id(), Utc::now()).await.is_err());
}

#[tokio::test]
async fn test_delete_directory() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;
    let dir = DataDirectory::new(*dataset.id(), "/data/live").unwrap();
    store.save_directory(&dir).await.unwrap();

    assert!(store.delete_directory(dir.id()).await.unwrap());
    assert!(!store.delete_directory(dir.id()).await.unwrap());
    assert!(store.get_directory(dir.id()).await.unwrap().is_none());
}

// ============================================================================
// Bins
// ============================================================================

#[tokio::test]
async fn test_save_and_get_bin_round_trip() {
    let store = setup().await;
    let mut b = bin("D20190102T1234_IFCB927");
    b.set_location(Some(Location::new(-70.5, 41.3).unwrap()));
    b.set_depth(4.5);
    b.update_qc_no_rois(true);
    b.set_metadata(serde_json::json!({"runTime": 1200.5, "note": "calm"}));
    b.apply_metrics(BinMetrics {
        size: 123_456,
        temperature: 11.0,
        humidity: 40.0,
        run_time: 1200.5,
        look_time: 1100.0,
        ml_analyzed: 4.583,
    });

    store.save_bins(std::slice::from_ref(&b)).await.unwrap();
    let loaded = store.get_bin(b.pid()).await.unwrap().unwrap();
    assert_eq!(loaded, b);
}

#[tokio::test]
async fn test_save_bins_upserts_without_duplicates() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;
    let mut b = bin("D20190102T1234_IFCB927");
    store.save_bins(std::slice::from_ref(&b)).await.unwrap();
    store.link_bins(dataset.id(), &[b.pid().clone()]).await.unwrap();

    b.apply_metrics(BinMetrics {
        size: 99,
        ..BinMetrics::default()
    });
    store.save_bins(std::slice::from_ref(&b)).await.unwrap();

    let loaded = store.get_bin(b.pid()).await.unwrap().unwrap();
    assert_eq!(loaded.metrics().size, 99);
    // the update must not drop the membership link
    assert_eq!(store.count_bins(dataset.id()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_link_bins_is_idempotent() {
    let store = setup().await;
    let a = create_dataset(&store, "a").await;
    let b = create_dataset(&store, "b").await;
    let x = bin("D20190102T1234_IFCB927");
    store.save_bins(std::slice::from_ref(&x)).await.unwrap();

    store.link_bins(a.id(), &[x.pid().clone()]).await.unwrap();
    store.link_bins(a.id(), &[x.pid().clone()]).await.unwrap();
    store.link_bins(b.id(), &[x.pid().clone()]).await.unwrap();

    assert_eq!(store.count_bins(a.id()).await.unwrap(), 1);
    let names: Vec<_> = store
        .datasets_for_bin(x.pid())
        .await
        .unwrap()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_link_unknown_bin_fails() {
    let store = setup().await;
    let a = create_dataset(&store, "a").await;
    let result = store.link_bins(a.id(), &[pid("D20190102T1234_IFCB927")]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_query_bins_range_and_flags() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;

    let mut bins = vec![
        bin("D20190101T0000_IFCB1"),
        bin("D20190102T0000_IFCB1"),
        bin("D20190103T0000_IFCB1"),
        bin("D20190104T0000_IFCB1"),
    ];
    bins[2].set_qc_bad(true);
    store.save_bins(&bins).await.unwrap();
    let pids: Vec<_> = bins.iter().map(|b| b.pid().clone()).collect();
    store.link_bins(dataset.id(), &pids[..3]).await.unwrap();

    let start = Utc.with_ymd_and_hms(2019, 1, 2, 0, 0, 0).unwrap();
    let in_range = store
        .query_bins(
            &BinQuery::new()
                .with_dataset(*dataset.id())
                .with_range(start, start + Duration::days(5)),
        )
        .await
        .unwrap();
    let found: Vec<_> = in_range.iter().map(|b| b.pid().as_str()).collect();
    assert_eq!(found, vec!["D20190102T0000_IFCB1", "D20190103T0000_IFCB1"]);

    let good = store
        .query_bins(&BinQuery::new().with_dataset(*dataset.id()).excluding_bad())
        .await
        .unwrap();
    assert_eq!(good.len(), 2);

    let everything = store.query_bins(&BinQuery::new().with_limit(3)).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].pid().as_str(), "D20190101T0000_IFCB1");
}

#[tokio::test]
async fn test_query_bins_end_is_inclusive() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;
    let sampled = bin("D20190102T1234_IFCB927");
    store.save_bins(&[sampled.clone()]).await.unwrap();
    store.link_bins(dataset.id(), &[sampled.pid().clone()]).await.unwrap();

    let at_end = store
        .query_bins(
            &BinQuery::new()
                .with_dataset(*dataset.id())
                .with_end(sampled.sample_time()),
        )
        .await
        .unwrap();
    assert_eq!(at_end.len(), 1);

    let before = store
        .query_bins(
            &BinQuery::new()
                .with_dataset(*dataset.id())
                .with_end(sampled.sample_time() - Duration::seconds(1)),
        )
        .await
        .unwrap();
    assert!(before.is_empty());
}

#[tokio::test]
async fn test_most_recent_bin() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;
    assert!(store.most_recent_bin(dataset.id(), None).await.unwrap().is_none());

    let bins = vec![bin("D20190105T0000_IFCB1"), bin("D20190101T0000_IFCB1")];
    store.save_bins(&bins).await.unwrap();
    let pids: Vec<_> = bins.iter().map(|b| b.pid().clone()).collect();
    store.link_bins(dataset.id(), &pids).await.unwrap();

    let latest = store.most_recent_bin(dataset.id(), None).await.unwrap().unwrap();
    assert_eq!(latest.pid().as_str(), "D20190105T0000_IFCB1");
}

#[tokio::test]
async fn test_most_recent_bin_at_time() {
    let store = setup().await;
    let dataset = create_dataset(&store, "mvco").await;

    let bins = vec![
        bin("D20190101T0000_IFCB1"),
        bin("D20190103T0000_IFCB1"),
        bin("D20190105T0000_IFCB1"),
    ];
    store.save_bins(&bins).await.unwrap();
    let pids: Vec<_> = bins.iter().map(|b| b.pid().clone()).collect();
    store.link_bins(dataset.id(), &pids).await.unwrap();

    let between = Utc.with_ymd_and_hms(2019, 1, 4, 12, 0, 0).unwrap();
    let latest = store
        .most_recent_bin(dataset.id(), Some(between))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.pid().as_str(), "D20190103T0000_IFCB1");

    // a bin sampled exactly at the cutoff counts
    let exact = Utc.with_ymd_and_hms(2019, 1, 5, 0, 0, 0).unwrap();
    let latest = store
        .most_recent_bin(dataset.id(), Some(exact))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.pid().as_str(), "D20190105T0000_IFCB1");

    let too_early = Utc.with_ymd_and_hms(2018, 12, 31, 0, 0, 0).unwrap();
    assert!(store
        .most_recent_bin(dataset.id(), Some(too_early))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_closest_bin_by_great_circle_distance() {
    let store = setup().await;
    let dataset = create_dataset(&store, "cruise").await;

    let mut near = bin("D20190101T0000_IFCB1");
    near.set_location(Some(Location::new(-70.0, 41.0).unwrap()));
    let mut far = bin("D20190102T0000_IFCB1");
    far.set_location(Some(Location::new(-60.0, 30.0).unwrap()));
    let nowhere = bin("D20190103T0000_IFCB1");

    let bins = vec![near, far, nowhere];
    store.save_bins(&bins).await.unwrap();
    let pids: Vec<_> = bins.iter().map(|b| b.pid().clone()).collect();
    store.link_bins(dataset.id(), &pids).await.unwrap();

    let target = Location::new(-70.1, 41.1).unwrap();
    let closest = store.closest_bin(dataset.id(), &target).await.unwrap().unwrap();
    assert_eq!(closest.pid().as_str(), "D20190101T0000_IFCB1");
}

#[tokio::test]
async fn test_new_bin_defaults_survive_storage() {
    let store = setup().await;
    let b = bin("IFCB1_2009_216_112409");
    store.save_bins(std::slice::from_ref(&b)).await.unwrap();

    let loaded = store.get_bin(b.pid()).await.unwrap().unwrap();
    assert_eq!(loaded.metrics().temperature, FILL_VALUE);
    assert!(loaded.location().is_none());
    assert_eq!(loaded.sample_time(), b.timestamp());
}
