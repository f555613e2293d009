//! Turn archived records into a download worklist.
//!
//! Records linking to direct imgur media are probed for their real content
//! type, then written as a canonical download URL plus a tag line pairing
//! the record's subreddit with a filename pattern.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use url::Url;

use crate::config::Config;
use crate::constants::MEDIA_HOST_MARKER;
use crate::store::Record;

pub mod imgur;
pub mod probe;
pub mod sinks;

pub use probe::{ContentTypeProbe, HttpProbe, ProbeError, ProbeThrottle};
pub use sinks::{OutputFiles, OutputSinks};

/// One line in each of the generated lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    /// Normalized download URL.
    pub url: String,
    /// `<subreddit> <filename pattern>` line for the tagger.
    pub tag: String,
}

pub struct LinkClassifier {
    probe: Box<dyn ContentTypeProbe>,
    throttle: ProbeThrottle,
    probe_base: String,
}

impl LinkClassifier {
    #[must_use]
    pub fn new(
        probe: Box<dyn ContentTypeProbe>,
        probe_base: impl Into<String>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            probe,
            throttle: ProbeThrottle::new(probe_interval),
            probe_base: probe_base.into(),
        }
    }

    /// Classifier probing over HTTP with the configured base and interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let probe = HttpProbe::new(config.http_timeout).context("Failed to build probe client")?;
        Ok(Self::new(
            Box::new(probe),
            config.probe_base_url.clone(),
            config.probe_interval,
        ))
    }

    /// Classify `records`, appending entries to `sinks`.
    ///
    /// Problems with a single record are logged and skipped. Returns the
    /// number of records that produced at least one entry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output lists cannot be written.
    pub async fn classify(&mut self, records: &[Record], sinks: &mut OutputSinks) -> Result<usize> {
        info!(count = records.len(), "Processing records");

        let mut emitted = 0;
        for record in records {
            let entries = self.entries_for(record).await;
            if entries.is_empty() {
                continue;
            }
            for entry in &entries {
                sinks.write(entry).await?;
            }
            emitted += 1;
        }

        info!(count = emitted, "Used imgur logic for records");
        Ok(emitted)
    }

    /// Download entries for a single record; empty if it has none.
    pub async fn entries_for(&mut self, record: &Record) -> Vec<DownloadEntry> {
        let Some(url) = record.url() else {
            return Vec::new();
        };
        if !is_media_host(url) {
            return Vec::new();
        }
        let Some(found) = imgur::match_media_url(url) else {
            debug!(url = %url, "Not a direct media link");
            return Vec::new();
        };

        let subreddit = record.subreddit().unwrap_or_default();
        let mut entries = Vec::with_capacity(found.hashes.len());
        for hash in &found.hashes {
            match self.resolve(hash).await {
                Ok(extension) => entries.push(DownloadEntry {
                    url: imgur::download_url(hash, extension),
                    tag: format!("{subreddit} {}", imgur::tag_pattern(hash)),
                }),
                Err(e) => error!(url = %url, hash = %hash, "Skipping media link: {e}"),
            }
        }
        entries
    }

    async fn resolve(&mut self, hash: &str) -> Result<&'static str, ProbeError> {
        let url = imgur::probe_url(&self.probe_base, hash);
        self.throttle.wait().await;
        let probed = self.probe.content_type(&url).await;
        self.throttle.finished();
        let content_type = probed?;
        imgur::canonical_extension(&content_type)
            .ok_or(ProbeError::UnrecognizedContentType { url, content_type })
    }
}

fn is_media_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.contains(MEDIA_HOST_MARKER)))
        .unwrap_or(false)
}
