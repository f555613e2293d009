//! Content-type discovery for media links.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::constants::USER_AGENT;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("probe of {url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("probe of {url} returned no content-type")]
    MissingContentType { url: String },
    #[error("unrecognized content-type '{content_type}' for {url}")]
    UnrecognizedContentType { url: String, content_type: String },
}

/// Something that can tell what a URL really serves.
#[async_trait]
pub trait ContentTypeProbe: Send + Sync {
    /// Return the `Content-Type` the URL is served with.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or carries no content type.
    async fn content_type(&self, url: &str) -> Result<String, ProbeError>;
}

/// Probe using an HTTP `HEAD` request.
///
/// Redirects are not followed: a removed image redirects to a placeholder,
/// and that placeholder's content type must not be taken for the original.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentTypeProbe for HttpProbe {
    async fn content_type(&self, url: &str) -> Result<String, ProbeError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|source| ProbeError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(url = %url, %status, "Probed content type");
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status,
            });
        }

        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| ProbeError::MissingContentType {
                url: url.to_string(),
            })
    }
}

/// Enforces a minimum gap between the end of one probe and the start of
/// the next.
#[derive(Debug)]
pub struct ProbeThrottle {
    interval: Duration,
    finished: Option<Instant>,
}

impl ProbeThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            finished: None,
        }
    }

    /// Wait until the interval since the last finished probe has passed.
    pub async fn wait(&self) {
        if let Some(finished) = self.finished {
            sleep_until(finished + self.interval).await;
        }
    }

    /// Record that a probe just completed, successfully or not.
    pub fn finished(&mut self) {
        self.finished = Some(Instant::now());
    }
}
