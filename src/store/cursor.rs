use tokio::fs;
use tracing::info;

use super::{write_atomic, ArchiveStore, Category, Cursor, StoreError};

impl ArchiveStore {
    /// Load the newest-seen identifier for `category`.
    ///
    /// Returns `None` on the first run for a category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CursorMissing`] when the record file exists but
    /// the cursor file does not, since resuming from scratch would re-fetch
    /// on top of a history of unknown extent.
    pub async fn load_cursor(&self, category: Category) -> Result<Option<Cursor>, StoreError> {
        let cursor_path = self.cursor_path(category);
        match fs::read_to_string(&cursor_path).await {
            Ok(raw) => {
                let id = raw.trim();
                if !id.is_empty() {
                    info!(%category, cursor = %id, "Found newest cursor");
                    return Ok(Some(Cursor::new(id)));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Io {
                    path: cursor_path,
                    source,
                })
            }
        }

        let records_path = self.records_path(category);
        if fs::try_exists(&records_path).await.unwrap_or(false) {
            return Err(StoreError::CursorMissing {
                category,
                records_path,
            });
        }

        info!(%category, "First time for category");
        Ok(None)
    }

    /// Overwrite the stored cursor for `category`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor file cannot be written.
    pub async fn save_cursor(&self, category: Category, cursor: &Cursor) -> Result<(), StoreError> {
        write_atomic(&self.cursor_path(category), cursor.as_str().as_bytes()).await
    }
}
