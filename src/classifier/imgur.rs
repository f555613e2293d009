//! URL rule for direct imgur image/video links.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::MEDIA_HOST;

/// Direct image/video links, including comma or ampersand separated hash
/// lists. Rust's regex engine has no lookahead, so the excluded first path
/// segments are checked separately against [`EXCLUDED_PREFIXES`].
static IMGUR_HASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^https?://(?:i\.|m\.|edge\.|www\.)*imgur\.com/
        (?P<hashes>[A-Za-z0-9_]{5,7}(?:[&,][A-Za-z0-9_]{5,7})*)
        (?:\#\d+)?
        [sbtmlh]?
        (?P<ext>\.(?:jpe?g|gif|png|gifv))?
        (?P<query>\?.*)?$",
    )
    .unwrap()
});

/// Paths on the imgur host that never point at a single piece of media.
const EXCLUDED_PREFIXES: &[&str] = &["gallery", "removalrequest", "random", "memegen"];

/// Content types the probe may report, with the extension they download as.
/// GIFs are fetched as MP4.
const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/gif", ".mp4"),
    ("image/png", ".png"),
];

/// A URL recognised as direct imgur media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgurMatch {
    /// One or more content identifiers, in URL order.
    pub hashes: Vec<String>,
    /// Extension as written in the URL, which is not trusted.
    pub extension: Option<String>,
}

/// Match `url` against the direct-media rule.
#[must_use]
pub fn match_media_url(url: &str) -> Option<ImgurMatch> {
    let caps = IMGUR_HASH.captures(url)?;
    let hashes = caps.name("hashes")?;

    let path = &url[hashes.start()..];
    if EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return None;
    }

    Some(ImgurMatch {
        hashes: hashes
            .as_str()
            .split(['&', ','])
            .map(ToString::to_string)
            .collect(),
        extension: caps.name("ext").map(|m| m.as_str().to_string()),
    })
}

/// Map a probed content type to the extension to download with.
#[must_use]
pub fn canonical_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
}

/// URL probed to learn the real content type of `hash`.
#[must_use]
pub fn probe_url(probe_base: &str, hash: &str) -> String {
    format!("{}/{hash}.jpg", probe_base.trim_end_matches('/'))
}

/// Normalized download URL for `hash` with the given canonical extension.
#[must_use]
pub fn download_url(hash: &str, extension: &str) -> String {
    format!("http://{MEDIA_HOST}/{hash}{extension}")
}

/// Filename pattern the tagger uses to find the downloaded file.
#[must_use]
pub fn tag_pattern(hash: &str) -> String {
    format!("{MEDIA_HOST}/*{hash}*")
}
