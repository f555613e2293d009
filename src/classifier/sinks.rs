//! The URL list and tag list written during a processing run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::DownloadEntry;
use crate::constants::{TAG_LIST_FILE, URL_LIST_FILE};

/// Append-mode writers for `urls.txt` and `tags.txt`, shared by every
/// category processed in one run.
#[derive(Debug)]
pub struct OutputSinks {
    paths: OutputFiles,
    urls: BufWriter<File>,
    tags: BufWriter<File>,
    written: usize,
}

/// Locations of the generated lists once the sinks are closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub archive_dir: PathBuf,
    pub urls: PathBuf,
    pub tags: PathBuf,
}

impl OutputFiles {
    /// Whether both lists exist and have content worth handing off.
    pub async fn both_non_empty(&self) -> bool {
        non_empty(&self.urls).await && non_empty(&self.tags).await
    }
}

impl OutputSinks {
    /// Clear any lists left by a previous run and open fresh ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive directory or files cannot be created.
    pub async fn create(archive_dir: &Path) -> Result<Self> {
        fs::create_dir_all(archive_dir).await.with_context(|| {
            format!(
                "Failed to create archive directory: {}",
                archive_dir.display()
            )
        })?;

        let paths = OutputFiles {
            archive_dir: archive_dir.to_path_buf(),
            urls: archive_dir.join(URL_LIST_FILE),
            tags: archive_dir.join(TAG_LIST_FILE),
        };

        let urls = open_truncated(&paths.urls).await?;
        let tags = open_truncated(&paths.tags).await?;

        Ok(Self {
            paths,
            urls: BufWriter::new(urls),
            tags: BufWriter::new(tags),
            written: 0,
        })
    }

    /// Append one entry to both lists.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub async fn write(&mut self, entry: &DownloadEntry) -> Result<()> {
        self.urls
            .write_all(format!("{}\n", entry.url).as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", self.paths.urls.display()))?;
        self.tags
            .write_all(format!("{}\n", entry.tag).as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", self.paths.tags.display()))?;
        self.written += 1;
        Ok(())
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and close both lists.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data cannot be flushed.
    pub async fn finish(mut self) -> Result<OutputFiles> {
        self.urls
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.paths.urls.display()))?;
        self.tags
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.paths.tags.display()))?;
        Ok(self.paths)
    }
}

async fn open_truncated(path: &Path) -> Result<File> {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove old {}", path.display()))
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))
}

async fn non_empty(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: &str) -> DownloadEntry {
        DownloadEntry {
            url: format!("http://i.imgur.com/{hash}.jpg"),
            tag: format!("pics i.imgur.com/*{hash}*"),
        }
    }

    #[tokio::test]
    async fn test_write_and_finish() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sinks = OutputSinks::create(dir.path()).await.unwrap();
        sinks.write(&entry("abcde")).await.unwrap();
        sinks.write(&entry("fghij")).await.unwrap();
        assert_eq!(sinks.written(), 2);

        let files = sinks.finish().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&files.urls).unwrap(),
            "http://i.imgur.com/abcde.jpg\nhttp://i.imgur.com/fghij.jpg\n"
        );
        assert_eq!(
            std::fs::read_to_string(&files.tags).unwrap(),
            "pics i.imgur.com/*abcde*\npics i.imgur.com/*fghij*\n"
        );
        assert!(files.both_non_empty().await);
    }

    #[tokio::test]
    async fn test_create_clears_previous_lists() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(URL_LIST_FILE), "stale\n").unwrap();
        std::fs::write(dir.path().join(TAG_LIST_FILE), "stale\n").unwrap();

        let files = OutputSinks::create(dir.path())
            .await
            .unwrap()
            .finish()
            .await
            .unwrap();
        assert!(!files.both_non_empty().await);
        assert_eq!(std::fs::read_to_string(&files.urls).unwrap(), "");
    }
}
