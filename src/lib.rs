//! Reddit Link Archiver library.
//!
//! Incrementally archives a user's saved/liked listings to JSON, resuming
//! from the newest record seen last time, and extracts direct imgur media
//! links into a URL list and tag list for an external downloader.

// Raw strings with hashes show up in JSON fixtures
#![allow(clippy::needless_raw_string_hashes)]

pub mod classifier;
pub mod cli;
pub mod config;
pub mod constants;
pub mod external;
pub mod fetcher;
pub mod pipeline;
pub mod source;
pub mod store;
