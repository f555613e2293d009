use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of per-user listing being archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Saved,
    #[serde(alias = "upvoted")]
    Liked,
    #[serde(alias = "downvoted")]
    Disliked,
    Hidden,
    Submitted,
    Comments,
    Gilded,
}

impl Category {
    /// Name used for on-disk artifacts (`<name>.json`, `<name>-newest.txt`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Liked => "liked",
            Self::Disliked => "disliked",
            Self::Hidden => "hidden",
            Self::Submitted => "submitted",
            Self::Comments => "comments",
            Self::Gilded => "gilded",
        }
    }

    /// Path segment of the user listing endpoint for this category.
    #[must_use]
    pub const fn listing_path(self) -> &'static str {
        match self {
            Self::Liked => "upvoted",
            Self::Disliked => "downvoted",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the newest archived record in a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One archived item, kept exactly as the listing API returned it.
///
/// Only a handful of fields are interpreted (`name`, `url`, `subreddit`);
/// everything else round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a JSON value, if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Unique identifier (Reddit "fullname", e.g. `t3_abc123`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.str_field("url")
    }

    #[must_use]
    pub fn subreddit(&self) -> Option<&str> {
        self.str_field("subreddit")
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}
