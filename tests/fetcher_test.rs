//! Integration tests for fetch+merge against an in-memory source.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use reddit_link_archiver::fetcher::{fetch_and_merge, fetch_new};
use reddit_link_archiver::source::{Listing, ListingSource, SourceIdentity};
use reddit_link_archiver::store::{ArchiveStore, Category, Cursor, Record, StoreError};
use serde_json::json;
use tempfile::TempDir;

/// Serves a fixed newest-first history and honours the cursor boundary.
#[derive(Clone, Default)]
struct MemorySource {
    history: Vec<Record>,
    single: bool,
    fail: bool,
    cursors: Arc<Mutex<Vec<Option<String>>>>,
}

impl MemorySource {
    fn with_names(names: &[&str]) -> Self {
        Self {
            history: names.iter().map(|n| record(n)).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ListingSource for MemorySource {
    async fn fetch_since(
        &self,
        _identity: &SourceIdentity,
        _category: Category,
        cursor: Option<&Cursor>,
    ) -> anyhow::Result<Listing> {
        self.cursors
            .lock()
            .unwrap()
            .push(cursor.map(|c| c.as_str().to_string()));
        if self.fail {
            anyhow::bail!("listing unavailable");
        }

        let newer: Vec<Record> = self
            .history
            .iter()
            .take_while(|r| cursor.map_or(true, |c| r.name() != Some(c.as_str())))
            .cloned()
            .collect();

        if self.single && newer.len() == 1 {
            return Ok(Listing::One(newer.into_iter().next().unwrap()));
        }
        Ok(Listing::Many(Box::pin(stream::iter(
            newer.into_iter().map(Ok),
        ))))
    }
}

fn record(name: &str) -> Record {
    Record::from_value(json!({ "name": name })).unwrap()
}

fn names(records: &[Record]) -> Vec<&str> {
    records.iter().filter_map(Record::name).collect()
}

fn alice() -> SourceIdentity {
    SourceIdentity::new("alice")
}

#[tokio::test]
async fn test_first_fetch_gets_everything() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    let source = MemorySource::with_names(&["t3_c", "t3_b", "t3_a"]);

    let merged = fetch_and_merge(&source, &store, &alice(), Category::Saved, false)
        .await
        .unwrap();

    assert_eq!(names(&merged.records), vec!["t3_c", "t3_b", "t3_a"]);
    assert_eq!(merged.fetched, 3);
    assert_eq!(*source.cursors.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_resume_from_cursor_does_not_duplicate() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    store
        .save_records(Category::Saved, &[record("t3_b"), record("t3_a")])
        .await
        .unwrap();

    let source = MemorySource::with_names(&["t3_d", "t3_c", "t3_b", "t3_a"]);
    let merged = fetch_and_merge(&source, &store, &alice(), Category::Saved, false)
        .await
        .unwrap();

    assert_eq!(names(merged.new_records()), vec!["t3_d", "t3_c"]);
    assert_eq!(names(&merged.records), vec!["t3_d", "t3_c", "t3_b", "t3_a"]);
    assert_eq!(
        *source.cursors.lock().unwrap(),
        vec![Some("t3_b".to_string())]
    );

    // Same run again after saving finds nothing new
    store
        .save_records(Category::Saved, &merged.records)
        .await
        .unwrap();
    let again = fetch_and_merge(&source, &store, &alice(), Category::Saved, false)
        .await
        .unwrap();
    assert!(again.new_records().is_empty());
    assert_eq!(again.records, merged.records);
}

#[tokio::test]
async fn test_fresh_start_ignores_cursor_and_history() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    store
        .save_records(Category::Liked, &[record("t3_gone")])
        .await
        .unwrap();

    let source = MemorySource::with_names(&["t3_b", "t3_a"]);
    let merged = fetch_and_merge(&source, &store, &alice(), Category::Liked, true)
        .await
        .unwrap();

    assert_eq!(names(&merged.records), vec!["t3_b", "t3_a"]);
    assert_eq!(*source.cursors.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_single_item_normalized() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    store
        .save_records(Category::Saved, &[record("t3_a")])
        .await
        .unwrap();

    let source = MemorySource {
        single: true,
        ..MemorySource::with_names(&["t3_b", "t3_a"])
    };
    let merged = fetch_and_merge(&source, &store, &alice(), Category::Saved, false)
        .await
        .unwrap();

    assert_eq!(merged.fetched, 1);
    assert_eq!(names(&merged.records), vec!["t3_b", "t3_a"]);
}

#[tokio::test]
async fn test_source_failure_propagates() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    let source = MemorySource {
        fail: true,
        ..MemorySource::default()
    };

    let err = fetch_new(&source, &alice(), Category::Saved, None)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("listing unavailable"));
    assert!(store.load_records(Category::Saved).await.is_empty());
}

#[tokio::test]
async fn test_contradictory_state_is_fatal() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::at(dir.path());
    std::fs::write(store.records_path(Category::Saved), "[]").unwrap();

    let source = MemorySource::with_names(&["t3_a"]);
    let err = fetch_and_merge(&source, &store, &alice(), Category::Saved, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::CursorMissing { .. })
    ));
    assert!(source.cursors.lock().unwrap().is_empty());
}
