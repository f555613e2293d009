use anyhow::{Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Listing, ListingSource, RecordStream, SourceIdentity};
use crate::config::Config;
use crate::constants::USER_AGENT;
use crate::store::{Category, Cursor, Record};

/// Listing client for `/user/<name>/<category>` endpoints.
///
/// Without a cursor, pages are followed through `after` (older) and
/// streamed as they arrive. With a cursor, pages are followed through
/// `before` (newer); those arrive oldest page first, so they are collected
/// and emitted in reverse to keep the newest-first contract.
#[derive(Debug, Clone)]
pub struct RedditListingSource {
    client: Client,
    api_base: String,
    access_token: Option<String>,
    page_size: u32,
}

impl RedditListingSource {
    /// Build a source from the listing settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: config.reddit_api_base.trim_end_matches('/').to_string(),
            access_token: config.reddit_access_token.clone(),
            page_size: config.listing_page_size,
        })
    }

    fn page_request(&self, identity: &SourceIdentity, category: Category) -> PageRequest {
        PageRequest {
            client: self.client.clone(),
            url: format!(
                "{}/user/{}/{}",
                self.api_base,
                urlencoding::encode(&identity.username),
                category.listing_path()
            ),
            access_token: self.access_token.clone(),
            page_size: self.page_size,
        }
    }
}

#[async_trait]
impl ListingSource for RedditListingSource {
    async fn fetch_since(
        &self,
        identity: &SourceIdentity,
        category: Category,
        cursor: Option<&Cursor>,
    ) -> Result<Listing> {
        let request = self.page_request(identity, category);
        let anchor = cursor.map_or(Anchor::Start, |c| Anchor::Before(c.as_str().to_string()));

        let first = match request.get(anchor).await? {
            Page::Single(record) => return Ok(Listing::One(record)),
            Page::Listing(page) => page,
        };

        let stream = if cursor.is_some() {
            newer_pages(request, first)
        } else {
            older_pages(request, first)
        };
        Ok(Listing::Many(stream))
    }
}

/// Where a page request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Anchor {
    Start,
    After(String),
    Before(String),
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    after: Option<String>,
    before: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug)]
struct ListingPage {
    records: Vec<Record>,
    after: Option<String>,
    before: Option<String>,
}

#[derive(Debug)]
enum Page {
    Listing(ListingPage),
    Single(Record),
}

#[derive(Debug, Clone)]
struct PageRequest {
    client: Client,
    url: String,
    access_token: Option<String>,
    page_size: u32,
}

impl PageRequest {
    async fn get(&self, anchor: Anchor) -> Result<Page> {
        let mut query = vec![
            ("limit", self.page_size.to_string()),
            ("raw_json", "1".to_string()),
        ];
        match &anchor {
            Anchor::Start => {}
            Anchor::After(id) => query.push(("after", id.clone())),
            Anchor::Before(id) => query.push(("before", id.clone())),
        }

        debug!(url = %self.url, ?anchor, "Fetching listing page");

        let mut request = self.client.get(&self.url).query(&query);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch listing {}", self.url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Listing fetch {} failed with status {}",
                self.url,
                response.status()
            );
        }

        let thing: Thing = response
            .json()
            .await
            .context("Failed to parse listing response")?;
        parse_thing(thing)
    }
}

fn parse_thing(thing: Thing) -> Result<Page> {
    if thing.kind != "Listing" {
        let record = Record::from_value(thing.data)
            .with_context(|| format!("'{}' thing has no data object", thing.kind))?;
        return Ok(Page::Single(record));
    }

    let data: ListingData =
        serde_json::from_value(thing.data).context("Malformed listing data")?;
    let mut records = Vec::with_capacity(data.children.len());
    for child in data.children {
        match Record::from_value(child.data) {
            Some(record) => records.push(record),
            None => warn!(kind = %child.kind, "Skipping listing child without a data object"),
        }
    }

    Ok(Page::Listing(ListingPage {
        records,
        after: data.after,
        before: data.before,
    }))
}

fn older_pages(request: PageRequest, first: ListingPage) -> RecordStream {
    Box::pin(stream! {
        let mut page = first;
        loop {
            let next = page.after.take().filter(|_| !page.records.is_empty());
            for record in std::mem::take(&mut page.records) {
                yield Ok(record);
            }
            let after = match next {
                Some(after) => after,
                None => break,
            };
            match request.get(Anchor::After(after)).await {
                Ok(Page::Listing(p)) => page = p,
                Ok(Page::Single(record)) => {
                    yield Ok(record);
                    break;
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

fn newer_pages(request: PageRequest, first: ListingPage) -> RecordStream {
    Box::pin(stream! {
        let mut pages = Vec::new();
        let mut page = first;
        loop {
            let next = page.before.take().filter(|_| !page.records.is_empty());
            pages.push(std::mem::take(&mut page.records));
            let before = match next {
                Some(before) => before,
                None => break,
            };
            match request.get(Anchor::Before(before)).await {
                Ok(Page::Listing(p)) => page = p,
                Ok(Page::Single(record)) => {
                    pages.push(vec![record]);
                    break;
                }
                Err(e) => {
                    // Nothing is emitted when a newer page is missing.
                    yield Err(e);
                    return;
                }
            }
        }
        for records in pages.into_iter().rev() {
            for record in records {
                yield Ok(record);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing() {
        let thing: Thing = serde_json::from_value(json!({
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "before": null,
                "children": [
                    { "kind": "t3", "data": { "name": "t3_a" } },
                    { "kind": "t3", "data": { "name": "t3_b" } }
                ]
            }
        }))
        .unwrap();

        let Page::Listing(page) = parse_thing(thing).unwrap() else {
            panic!("expected a listing page");
        };
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.after.as_deref(), Some("t3_b"));
        assert_eq!(page.before, None);
    }

    #[test]
    fn test_parse_single_thing() {
        let thing: Thing = serde_json::from_value(json!({
            "kind": "t3",
            "data": { "name": "t3_only", "url": "https://imgur.com/abcde" }
        }))
        .unwrap();

        let Page::Single(record) = parse_thing(thing).unwrap() else {
            panic!("expected a single thing");
        };
        assert_eq!(record.name(), Some("t3_only"));
    }

    #[test]
    fn test_parse_listing_skips_malformed_child() {
        let thing: Thing = serde_json::from_value(json!({
            "kind": "Listing",
            "data": {
                "after": null,
                "before": null,
                "children": [
                    { "kind": "t3", "data": { "name": "t3_a" } },
                    { "kind": "more", "data": ["t1_x", "t1_y"] },
                    { "kind": "t3", "data": { "name": "t3_b" } }
                ]
            }
        }))
        .unwrap();

        let Page::Listing(page) = parse_thing(thing).unwrap() else {
            panic!("expected a listing page");
        };
        let names: Vec<_> = page.records.iter().filter_map(Record::name).collect();
        assert_eq!(names, vec!["t3_a", "t3_b"]);
    }

    #[test]
    fn test_parse_single_without_data_object() {
        let thing: Thing = serde_json::from_value(json!({ "kind": "t3", "data": 7 })).unwrap();
        assert!(parse_thing(thing).is_err());
    }
}
