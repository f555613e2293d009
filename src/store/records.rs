use std::fmt;

use serde::de::{DeserializeSeed, SeqAccess, Visitor};
use tokio::fs;
use tracing::{debug, error};

use super::{write_atomic, ArchiveStore, Category, Cursor, Record, StoreError};

impl ArchiveStore {
    /// Load the archived record set for `category`, newest first.
    ///
    /// A missing file is an empty history. A malformed file is reported and
    /// whatever records parsed before the damage are returned.
    pub async fn load_records(&self, category: Category) -> Vec<Record> {
        let path = self.records_path(category);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!(%category, path = %path.display(), "Failed to read archived records: {e}");
                return Vec::new();
            }
        };

        let (records, result) = parse_partial(&raw);
        match result {
            Ok(()) => debug!(%category, count = records.len(), "Loaded archived records"),
            Err(e) => error!(
                %category,
                path = %path.display(),
                recovered = records.len(),
                "Archived records are corrupt: {e}"
            ),
        }
        records
    }

    /// Persist `records` and advance the cursor to the first (newest) one.
    ///
    /// An empty set is ignored so a failed or empty fetch never clobbers a
    /// good history. Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the newest record has no identifier or the files
    /// cannot be written.
    pub async fn save_records(
        &self,
        category: Category,
        records: &[Record],
    ) -> Result<bool, StoreError> {
        let Some(newest) = records.first() else {
            debug!(%category, "Nothing to save");
            return Ok(false);
        };
        let cursor = newest
            .name()
            .map(Cursor::new)
            .ok_or(StoreError::MissingIdentifier { category })?;

        let body = serde_json::to_vec(records)
            .map_err(|source| StoreError::Serialize { category, source })?;

        // Records first: a crash in between leaves the old cursor, which only
        // causes a re-fetch of records already on disk.
        write_atomic(&self.records_path(category), &body).await?;
        self.save_cursor(category, &cursor).await?;

        debug!(%category, count = records.len(), %cursor, "Saved archived records");
        Ok(true)
    }
}

/// Parse a JSON array of records, keeping every element read before an error.
fn parse_partial(raw: &str) -> (Vec<Record>, serde_json::Result<()>) {
    let mut records = Vec::new();
    let mut de = serde_json::Deserializer::from_str(raw);
    let result = Accumulate(&mut records)
        .deserialize(&mut de)
        .and_then(|()| de.end());
    (records, result)
}

struct Accumulate<'a>(&'a mut Vec<Record>);

impl<'de> DeserializeSeed<'de> for Accumulate<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Accumulate<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(record) = seq.next_element::<Record>()? {
            self.0.push(record);
        }
        Ok(())
    }
}
