//! Drive fetch, merge, classification and persistence for every configured
//! user and category.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::classifier::{LinkClassifier, OutputSinks};
use crate::config::{Config, UserEntry};
use crate::external::DownloadHandoff;
use crate::fetcher;
use crate::source::{ListingSource, SourceIdentity};
use crate::store::{ArchiveStore, Category, Record};

/// Run-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore stored cursors and history.
    pub fresh_start: bool,
    /// Classify the whole merged history rather than only new records.
    pub reprocess: bool,
    /// Persist the merged history and advance cursors.
    pub save: bool,
    /// Classify newly fetched records and hand the lists off.
    pub process: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fresh_start: false,
            reprocess: false,
            save: true,
            process: false,
        }
    }
}

impl RunOptions {
    /// Whether this run produces URL and tag lists at all.
    #[must_use]
    pub fn classifies(&self) -> bool {
        self.process || self.reprocess
    }
}

/// Outcome for one successfully processed category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub username: String,
    pub category: Category,
    /// Records newly retrieved from the source.
    pub fetched: usize,
    /// Size of the merged archived set.
    pub archived: usize,
    /// Records that produced download entries.
    pub emitted: usize,
    /// Whether the archived set was written to disk.
    pub saved: bool,
}

/// A category whose pass was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    pub username: String,
    pub category: Category,
    pub error: String,
}

/// What happened to the generated lists at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    NotRequested,
    NothingToDo,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
    pub failures: Vec<CategoryFailure>,
    /// Download entries written to the lists across all categories.
    pub entries: usize,
    pub handoff: HandoffOutcome,
}

impl RunReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !matches!(self.handoff, HandoffOutcome::Failed(_))
    }

    pub fn log_summary(&self) {
        for c in &self.categories {
            info!(
                user = %c.username,
                category = %c.category,
                fetched = c.fetched,
                archived = c.archived,
                emitted = c.emitted,
                saved = c.saved,
                "Category done"
            );
        }
        for f in &self.failures {
            error!(user = %f.username, category = %f.category, "Category failed: {}", f.error);
        }
        info!(entries = self.entries, handoff = ?self.handoff, "Run finished");
    }
}

pub struct Pipeline {
    state_dir: PathBuf,
    archive_dir: PathBuf,
    source: Box<dyn ListingSource>,
    classifier: LinkClassifier,
    handoff: Box<dyn DownloadHandoff>,
    options: RunOptions,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: &Config,
        source: Box<dyn ListingSource>,
        classifier: LinkClassifier,
        handoff: Box<dyn DownloadHandoff>,
        options: RunOptions,
    ) -> Self {
        Self {
            state_dir: config.state_dir.clone(),
            archive_dir: config.archive_dir.clone(),
            source,
            classifier,
            handoff,
            options,
        }
    }

    /// Process every user and category in order.
    ///
    /// A failing category is recorded in the report and the run moves on;
    /// categories already saved stay saved.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output lists cannot be created or closed.
    pub async fn run(&mut self, users: &[UserEntry]) -> Result<RunReport> {
        let mut sinks = if self.options.classifies() {
            Some(OutputSinks::create(&self.archive_dir).await?)
        } else {
            None
        };

        let mut categories = Vec::new();
        let mut failures = Vec::new();

        for user in users {
            info!(user = %user.username, "Archiving user");
            let identity = SourceIdentity::new(&user.username);

            let store = match ArchiveStore::open(&self.state_dir, &user.username).await {
                Ok(store) => store,
                Err(e) => {
                    error!(user = %user.username, "Skipping user: {e:#}");
                    failures.extend(user.to_archive.iter().map(|&category| CategoryFailure {
                        username: user.username.clone(),
                        category,
                        error: format!("{e:#}"),
                    }));
                    continue;
                }
            };

            for &category in &user.to_archive {
                match self
                    .run_category(&store, &identity, category, sinks.as_mut())
                    .await
                {
                    Ok(report) => categories.push(report),
                    Err(e) => {
                        error!(user = %user.username, %category, "Category aborted: {e:#}");
                        failures.push(CategoryFailure {
                            username: user.username.clone(),
                            category,
                            error: format!("{e:#}"),
                        });
                    }
                }
            }
        }

        let entries = sinks.as_ref().map_or(0, OutputSinks::written);
        let handoff = match sinks {
            Some(sinks) => {
                let files = sinks.finish().await?;
                if files.both_non_empty().await {
                    match self.handoff.hand_off(&files).await {
                        Ok(()) => HandoffOutcome::Completed,
                        Err(e) => {
                            error!("Download hand-off failed: {e:#}");
                            HandoffOutcome::Failed(format!("{e:#}"))
                        }
                    }
                } else {
                    info!("No media links found, nothing to download");
                    HandoffOutcome::NothingToDo
                }
            }
            None => HandoffOutcome::NotRequested,
        };

        Ok(RunReport {
            categories,
            failures,
            entries,
            handoff,
        })
    }

    async fn run_category(
        &mut self,
        store: &ArchiveStore,
        identity: &SourceIdentity,
        category: Category,
        sinks: Option<&mut OutputSinks>,
    ) -> Result<CategoryReport> {
        let merged = fetcher::fetch_and_merge(
            self.source.as_ref(),
            store,
            identity,
            category,
            self.options.fresh_start,
        )
        .await?;

        let emitted = match sinks {
            Some(sinks) => {
                let batch: &[Record] = if self.options.reprocess {
                    &merged.records
                } else {
                    merged.new_records()
                };
                self.classifier.classify(batch, sinks).await?
            }
            None => 0,
        };

        let saved = if self.options.save {
            store
                .save_records(category, &merged.records)
                .await
                .with_context(|| format!("Failed to save {category}"))?
        } else {
            false
        };
        if self.options.save && !saved {
            warn!(user = %identity.username, %category, "Nothing archived yet, not saving");
        }

        Ok(CategoryReport {
            username: identity.username.clone(),
            category,
            fetched: merged.fetched,
            archived: merged.records.len(),
            emitted,
            saved,
        })
    }
}
