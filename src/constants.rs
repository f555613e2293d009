//! Shared constants used across the application.

/// User agent sent with listing requests and content-type probes.
pub const USER_AGENT: &str = concat!(
    "reddit-link-archiver/",
    env!("CARGO_PKG_VERSION"),
    " (incremental saved/liked archiver)"
);

/// Host that canonical media download URLs point at.
pub const MEDIA_HOST: &str = "i.imgur.com";

/// Substring of a URL host that marks it as a candidate for media extraction.
pub const MEDIA_HOST_MARKER: &str = "imgur";

/// Name of the generated URL list inside the archive directory.
pub const URL_LIST_FILE: &str = "urls.txt";

/// Name of the generated tag list inside the archive directory.
pub const TAG_LIST_FILE: &str = "tags.txt";
