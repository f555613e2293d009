use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::store::Category;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error(
        "no user list at {}; create it (see users.json.template) or pass --username",
        .0.display()
    )]
    MissingUsersFile(PathBuf),
    #[error("failed to read user list {}: {source}", path.display())]
    ReadUsersFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse user list {}: {source}", path.display())]
    ParseUsersFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Local state
    pub state_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub users_file: PathBuf,

    // Listing API
    pub reddit_api_base: String,
    pub reddit_access_token: Option<String>,
    pub listing_page_size: u32,
    pub http_timeout: Duration,

    // Media probing
    pub probe_base_url: String,
    pub probe_interval: Duration,

    // External tools
    pub wget_path: String,
    pub download_wait_secs: u32,
    pub tagger_path: PathBuf,
}

/// One entry of the user list: who to archive and which categories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserEntry {
    pub username: String,
    #[serde(rename = "toArchive")]
    pub to_archive: Vec<Category>,
}

impl UserEntry {
    /// Entry used when a single username is given on the command line.
    #[must_use]
    pub fn with_default_categories(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            to_archive: vec![Category::Liked, Category::Saved],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = expand_home(&env_or_default("STATE_DIR", "~/.redditarchiver"));
        let users_file = optional_env("USERS_FILE")
            .map_or_else(|| state_dir.join("users.json"), |p| expand_home(&p));

        Ok(Self {
            archive_dir: expand_home(&env_or_default("ARCHIVE_DIR", "~/Archive")),
            users_file,
            state_dir,

            reddit_api_base: env_or_default("REDDIT_API_BASE", "https://oauth.reddit.com"),
            reddit_access_token: optional_env("REDDIT_ACCESS_TOKEN"),
            listing_page_size: parse_env_u32("LISTING_PAGE_SIZE", 100)?,
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            probe_base_url: env_or_default("PROBE_BASE_URL", "http://i.imgur.com"),
            probe_interval: Duration::from_millis(parse_env_u64("PROBE_INTERVAL_MS", 1000)?),

            wget_path: env_or_default("WGET_PATH", "wget"),
            download_wait_secs: parse_env_u32("DOWNLOAD_WAIT_SECS", 2)?,
            tagger_path: PathBuf::from(env_or_default("TAGGER_PATH", "mktags.sh")),
        })
    }

    /// Configuration rooted in the given directory, with no probe delay.
    #[must_use]
    pub fn for_testing(root: &Path) -> Self {
        Self {
            state_dir: root.join("state"),
            archive_dir: root.join("archive"),
            users_file: root.join("state").join("users.json"),
            reddit_api_base: "http://127.0.0.1:9".to_string(),
            reddit_access_token: None,
            listing_page_size: 100,
            http_timeout: Duration::from_secs(5),
            probe_base_url: "http://127.0.0.1:9".to_string(),
            probe_interval: Duration::ZERO,
            wget_path: "wget".to_string(),
            download_wait_secs: 2,
            tagger_path: PathBuf::from("mktags.sh"),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing_page_size == 0 || self.listing_page_size > 100 {
            return Err(ConfigError::InvalidValue {
                name: "LISTING_PAGE_SIZE".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.reddit_api_base.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "REDDIT_API_BASE".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Read the user list from `users_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn load_users(&self) -> Result<Vec<UserEntry>, ConfigError> {
        let path = &self.users_file;
        if !path.exists() {
            return Err(ConfigError::MissingUsersFile(path.clone()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadUsersFile {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseUsersFile {
            path: path.clone(),
            source,
        })
    }
}

/// Expand a leading `~` to the current user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
