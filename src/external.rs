//! Hand the generated lists to the bulk downloader and the tagger.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::classifier::OutputFiles;
use crate::config::Config;

/// Consumer of a finished URL list and tag list.
#[async_trait]
pub trait DownloadHandoff: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the downstream step fails.
    async fn hand_off(&self, files: &OutputFiles) -> Result<()>;
}

/// `wget` for downloading followed by a tagging script.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub wget_path: String,
    pub wait_secs: u32,
    pub tagger_path: PathBuf,
}

impl ExternalTools {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            wget_path: config.wget_path.clone(),
            wait_secs: config.download_wait_secs,
            tagger_path: config.tagger_path.clone(),
        }
    }

    /// Fetch every URL in the list into the archive directory, mirroring
    /// host paths and skipping files that are already up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the downloader cannot be run or exits non-zero.
    pub async fn download(&self, files: &OutputFiles) -> Result<()> {
        let wait = self.wait_secs.to_string();
        let urls = file_name(&files.urls)?;
        info!(list = %files.urls.display(), "Running downloader");

        run(
            Command::new(&self.wget_path)
                .args(["-xN", "-w", wait.as_str(), "-i", urls])
                .current_dir(&files.archive_dir),
            &self.wget_path,
        )
        .await
    }

    /// Run the tagger over the tag list.
    ///
    /// A tagger given as an existing file is first copied next to the
    /// downloads and run from there.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be copied or run, or exits
    /// non-zero.
    pub async fn apply_tags(&self, files: &OutputFiles) -> Result<()> {
        let program = self.stage_tagger(&files.archive_dir).await?;
        let tags = file_name(&files.tags)?;
        info!(list = %files.tags.display(), tagger = %program.display(), "Running tagger");

        run(
            Command::new(&program)
                .arg(tags)
                .current_dir(&files.archive_dir),
            &program.to_string_lossy(),
        )
        .await
    }

    async fn stage_tagger(&self, archive_dir: &Path) -> Result<PathBuf> {
        if !self.tagger_path.is_file() {
            return Ok(self.tagger_path.clone());
        }
        let Some(name) = self.tagger_path.file_name() else {
            return Ok(self.tagger_path.clone());
        };

        let staged = archive_dir.join(name);
        let same_file = match (
            tokio::fs::canonicalize(&self.tagger_path).await,
            tokio::fs::canonicalize(&staged).await,
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            tokio::fs::copy(&self.tagger_path, &staged)
                .await
                .with_context(|| {
                    format!(
                        "Failed to copy tagger {} to {}",
                        self.tagger_path.display(),
                        staged.display()
                    )
                })?;
            debug!(from = %self.tagger_path.display(), to = %staged.display(), "Staged tagger");
        }
        Ok(staged)
    }
}

#[async_trait]
impl DownloadHandoff for ExternalTools {
    async fn hand_off(&self, files: &OutputFiles) -> Result<()> {
        self.download(files).await?;
        self.apply_tags(files).await
    }
}

/// Check if the downloader is available.
pub async fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}

async fn run(command: &mut Command, label: &str) -> Result<()> {
    let status = command
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| format!("Failed to spawn {label}"))?;

    if !status.success() {
        anyhow::bail!("{label} failed: {status}");
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a usable file name: {}", path.display()))
}
