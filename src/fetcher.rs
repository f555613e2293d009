//! Fetch newly available records for a category and merge them with history.

use std::collections::HashSet;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tracing::{info, warn};

use crate::source::{Listing, ListingSource, SourceIdentity};
use crate::store::{ArchiveStore, Category, Cursor, Record};

/// Result of one fetch+merge pass for a category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedFetch {
    /// Full archived set, newest first. The first `fetched` entries came
    /// from this pass.
    pub records: Vec<Record>,
    /// Number of leading records that were newly fetched.
    pub fetched: usize,
}

impl MergedFetch {
    /// Records retrieved during this pass.
    #[must_use]
    pub fn new_records(&self) -> &[Record] {
        &self.records[..self.fetched]
    }
}

/// Drain the listing for `category` newer than `cursor`.
///
/// # Errors
///
/// Returns an error if any page of the listing fails; nothing partial is
/// returned in that case.
pub async fn fetch_new(
    source: &dyn ListingSource,
    identity: &SourceIdentity,
    category: Category,
    cursor: Option<&Cursor>,
) -> Result<Vec<Record>> {
    info!(user = %identity.username, %category, "Getting records");

    let listing = source
        .fetch_since(identity, category, cursor)
        .await
        .with_context(|| format!("Failed to list {category} for {}", identity.username))?;

    let records = match listing {
        Listing::One(record) => vec![record],
        Listing::Many(mut stream) => {
            let mut records = Vec::new();
            while let Some(record) = stream.next().await {
                records.push(record.with_context(|| {
                    format!("Failed to list {category} for {}", identity.username)
                })?);
            }
            records
        }
    };

    info!(user = %identity.username, %category, count = records.len(), "Got new records");
    Ok(records)
}

/// Append `old` after `new`, dropping any record whose identifier was already
/// seen earlier in the sequence.
///
/// Returns the merged set and how many of `new` survived.
#[must_use]
pub fn merge_history(new: Vec<Record>, old: Vec<Record>) -> MergedFetch {
    let incoming = new.len() + old.len();
    let mut seen = HashSet::with_capacity(incoming);
    let mut records = Vec::with_capacity(incoming);

    let mut keep = |record: Record, records: &mut Vec<Record>| {
        let unique = match record.name() {
            Some(name) => seen.insert(name.to_string()),
            None => true,
        };
        if unique {
            records.push(record);
        }
    };

    for record in new {
        keep(record, &mut records);
    }
    let fetched = records.len();
    for record in old {
        keep(record, &mut records);
    }

    let dropped = incoming - records.len();
    if dropped > 0 {
        warn!(dropped, "Dropped duplicate records while merging");
    }

    MergedFetch { records, fetched }
}

/// Run the complete fetch+merge for one category.
///
/// With `fresh_start`, the stored cursor and history are ignored and the
/// result holds only what the source returned.
///
/// # Errors
///
/// Returns an error if the stored state is contradictory or the listing
/// fails. Stored data is never modified here.
pub async fn fetch_and_merge(
    source: &dyn ListingSource,
    store: &ArchiveStore,
    identity: &SourceIdentity,
    category: Category,
    fresh_start: bool,
) -> Result<MergedFetch> {
    let cursor = if fresh_start {
        None
    } else {
        store.load_cursor(category).await?
    };

    let new = fetch_new(source, identity, category, cursor.as_ref()).await?;
    let old = if fresh_start {
        Vec::new()
    } else {
        store.load_records(category).await
    };
    Ok(merge_history(new, old))
}
