//! Per-user on-disk state: the newest-seen cursor and the archived record set
//! for every category.
//!
//! Layout under the user directory:
//!
//! ```text
//! <state-dir>/<username>/<category>.json        archived records, newest first
//! <state-dir>/<username>/<category>-newest.txt  identifier of the newest record
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::fs;

mod cursor;
mod models;
mod records;

pub use models::{Category, Cursor, Record};

#[derive(Debug, Error)]
pub enum StoreError {
    /// History exists without a cursor; a previous run was interrupted
    /// or the directory was edited by hand.
    #[error(
        "no {category}-newest cursor, but {} exists; refusing to continue",
        records_path.display()
    )]
    CursorMissing {
        category: Category,
        records_path: PathBuf,
    },
    #[error("newest {category} record has no identifier")]
    MissingIdentifier { category: Category },
    #[error("failed to serialize {category} records: {source}")]
    Serialize {
        category: Category,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-backed cursor and record storage for one source identity.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    user_dir: PathBuf,
}

impl ArchiveStore {
    /// Open (creating if needed) the state directory for `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(state_dir: &Path, username: &str) -> Result<Self> {
        let user_dir = state_dir.join(username);
        fs::create_dir_all(&user_dir)
            .await
            .with_context(|| format!("Failed to create user directory: {}", user_dir.display()))?;
        Ok(Self { user_dir })
    }

    /// Wrap an existing directory without touching the filesystem.
    #[must_use]
    pub fn at(user_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
        }
    }

    #[must_use]
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    #[must_use]
    pub fn cursor_path(&self, category: Category) -> PathBuf {
        self.user_dir.join(format!("{category}-newest.txt"))
    }

    #[must_use]
    pub fn records_path(&self, category: Category) -> PathBuf {
        self.user_dir.join(format!("{category}.json"))
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)
        .await
        .map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
