//! The remote listing capability: "given an optional resume cursor, produce a
//! lazy sequence of records, newest first".

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::store::{Category, Cursor, Record};

pub mod reddit;

pub use reddit::RedditListingSource;

/// Lazy, fallible sequence of records, newest first.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Shape of a listing response.
///
/// Some endpoints answer with a bare thing instead of a listing when exactly
/// one item is available; the fetcher flattens both into one sequence.
pub enum Listing {
    Many(RecordStream),
    One(Record),
}

/// The account whose listings are being archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub username: String,
}

impl SourceIdentity {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// A paginated remote source of per-user listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Start listing `category` for `identity`, returning only records newer
    /// than `cursor` (everything when `cursor` is `None`).
    ///
    /// # Errors
    ///
    /// Returns an error if the first page cannot be retrieved.
    async fn fetch_since(
        &self,
        identity: &SourceIdentity,
        category: Category,
        cursor: Option<&Cursor>,
    ) -> Result<Listing>;
}
