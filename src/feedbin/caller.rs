//! Feedbin v2 API caller: one method per remote endpoint.
//!
//! Owns the transport (credentials, pacing, suspend flag, conditional-GET
//! store) and translates each HTTP result into a typed outcome. Status-code
//! reinterpretations (302/401 as "already subscribed", 404 as "not found")
//! are specific to the endpoints that document them and are never applied
//! elsewhere.

use crate::account::{since_window, AccountMetadata, CacheResource};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::feedbin::models::{
    CreateSubscriptionResult, Entry, EntryPage, ImportResult, RenameTagBody, Subscription,
    SubscriptionChoice, Tag, Tagging,
};
use crate::transport::{ApiError, Transport};
use crate::util::{parse_http_date, parse_link_header, PageLinks};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use std::sync::{Arc, Mutex, PoisonError};

/// Feedbin caps `ids=` batch lookups at 100 entries per request.
const MAX_IDS_PER_REQUEST: usize = 100;

/// API caller for one Feedbin account.
///
/// Cheap to clone; clones share the transport, so `suspend()` on any handle
/// pauses them all. The caller mutates the account metadata only after
/// successful responses; the account object owns the metadata's lifecycle
/// and persistence.
#[derive(Clone)]
pub struct FeedbinClient {
    transport: Transport,
    base_url: String,
    per_page: u32,
    /// Start time of the last backdated (widened-window) entry fetch.
    /// Session-ephemeral by design: restarting the process allows one
    /// fresh backdate, which is harmless.
    last_backdate_start: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl FeedbinClient {
    pub fn new(
        config: &Config,
        credentials: Credentials,
        metadata: Arc<Mutex<AccountMetadata>>,
    ) -> Result<Self, ApiError> {
        let transport = Transport::new(config, credentials, metadata)?;
        Ok(Self {
            transport,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
            last_backdate_start: Arc::new(Mutex::new(None)),
        })
    }

    /// Stop issuing requests and abort those in flight. Every call fails
    /// with [`ApiError::Suspended`] until [`FeedbinClient::resume`].
    pub fn suspend(&self) {
        self.transport.suspend();
    }

    pub fn resume(&self) {
        self.transport.resume();
    }

    pub fn is_suspended(&self) -> bool {
        self.transport.is_suspended()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Check the stored credentials against the service.
    ///
    /// `Ok(false)` means the service answered and rejected them (401);
    /// any other non-2xx status is an error.
    pub async fn verify_credentials(&self) -> Result<bool, ApiError> {
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/authentication.json"));
        let response = self.transport.send(builder).await?;
        match response.status {
            s if (200..300).contains(&s) => Ok(true),
            401 => Ok(false),
            s => Err(ApiError::HttpStatus(s)),
        }
    }

    // ========================================================================
    // OPML import
    // ========================================================================

    /// Upload an OPML document for server-side import. The body is opaque
    /// to this layer. Poll [`FeedbinClient::import_status`] until complete.
    pub async fn import_opml(&self, opml: Vec<u8>) -> Result<ImportResult, ApiError> {
        let builder = self
            .transport
            .request(Method::POST, &self.url("/v2/imports.json"))
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(opml);
        let response = self.transport.send(builder).await?.require_success()?;
        response.json()
    }

    pub async fn import_status(&self, import_id: u64) -> Result<ImportResult, ApiError> {
        let builder = self.transport.request(
            Method::GET,
            &self.url(&format!("/v2/imports/{}.json", import_id)),
        );
        let response = self.transport.send(builder).await?.require_success()?;
        response.json()
    }

    // ========================================================================
    // Tags & taggings
    // ========================================================================

    /// Fetch all tags. `Ok(None)` means unchanged since the stored
    /// validators (304).
    pub async fn tags(&self) -> Result<Option<Vec<Tag>>, ApiError> {
        let builder = self.transport.request(Method::GET, &self.url("/v2/tags.json"));
        match self
            .transport
            .send_cached(builder, CacheResource::Tags)
            .await?
        {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    /// Rename a tag across the whole account. Returns the updated tag list.
    pub async fn rename_tag(&self, old_name: &str, new_name: &str) -> Result<Vec<Tag>, ApiError> {
        let builder = self
            .transport
            .request(Method::POST, &self.url("/v2/tags.json"))
            .json(&RenameTagBody { old_name, new_name });
        let response = self.transport.send(builder).await?.require_success()?;
        response.json()
    }

    /// Fetch all taggings. `Ok(None)` on 304.
    pub async fn taggings(&self) -> Result<Option<Vec<Tagging>>, ApiError> {
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/taggings.json"));
        match self
            .transport
            .send_cached(builder, CacheResource::Taggings)
            .await?
        {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    /// Assign a feed to a tag. Returns the tagging ID parsed from the
    /// `Location` header; 302 means the tagging already existed and its ID
    /// comes from the same header.
    pub async fn create_tagging(&self, feed_id: u64, name: &str) -> Result<u64, ApiError> {
        let builder = self
            .transport
            .request(Method::POST, &self.url("/v2/taggings.json"))
            .json(&serde_json::json!({ "feed_id": feed_id, "name": name }));
        let response = self.transport.send(builder).await?;
        match response.status {
            201 | 302 => response
                .header("Location")
                .and_then(id_from_location)
                .ok_or(ApiError::NoData),
            s if (200..300).contains(&s) => Err(ApiError::NoData),
            s => Err(ApiError::HttpStatus(s)),
        }
    }

    pub async fn delete_tagging(&self, tagging_id: u64) -> Result<(), ApiError> {
        let builder = self.transport.request(
            Method::DELETE,
            &self.url(&format!("/v2/taggings/{}.json", tagging_id)),
        );
        self.transport.send(builder).await?.require_success()?;
        Ok(())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Fetch all subscriptions (extended mode). `Ok(None)` on 304.
    pub async fn subscriptions(&self) -> Result<Option<Vec<Subscription>>, ApiError> {
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/subscriptions.json"))
            .query(&[("mode", "extended")]);
        match self
            .transport
            .send_cached(builder, CacheResource::Subscriptions)
            .await?
        {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    /// Subscribe to a feed URL, disambiguating the four documented outcomes
    /// by HTTP status.
    ///
    /// The 401 → already-subscribed and 404 → not-found mappings are quirks
    /// of this endpoint only; elsewhere those statuses stay errors.
    pub async fn create_subscription(
        &self,
        feed_url: &str,
    ) -> Result<CreateSubscriptionResult, ApiError> {
        let builder = self
            .transport
            .request(Method::POST, &self.url("/v2/subscriptions.json"))
            .query(&[("mode", "extended")])
            .json(&serde_json::json!({ "feed_url": feed_url }));
        let response = self.transport.send(builder).await?;
        match response.status {
            201 => Ok(CreateSubscriptionResult::Created(response.json()?)),
            300 => {
                let choices: Vec<SubscriptionChoice> = response.json()?;
                Ok(CreateSubscriptionResult::MultipleChoices(choices))
            }
            302 | 401 => Ok(CreateSubscriptionResult::AlreadySubscribed),
            404 => Ok(CreateSubscriptionResult::NotFound),
            s if (200..300).contains(&s) => Ok(CreateSubscriptionResult::Created(response.json()?)),
            s => Err(ApiError::HttpStatus(s)),
        }
    }

    pub async fn rename_subscription(
        &self,
        subscription_id: u64,
        title: &str,
    ) -> Result<(), ApiError> {
        let builder = self
            .transport
            .request(
                Method::POST,
                &self.url(&format!("/v2/subscriptions/{}/update.json", subscription_id)),
            )
            .json(&serde_json::json!({ "title": title }));
        self.transport.send(builder).await?.require_success()?;
        Ok(())
    }

    pub async fn delete_subscription(&self, subscription_id: u64) -> Result<(), ApiError> {
        let builder = self.transport.request(
            Method::DELETE,
            &self.url(&format!("/v2/subscriptions/{}.json", subscription_id)),
        );
        self.transport.send(builder).await?.require_success()?;
        Ok(())
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Fetch specific entries by ID.
    ///
    /// An empty ID list returns an empty result immediately, with no network
    /// call. Larger lists are chunked to the server's 100-ID batch limit.
    pub async fn entries_for_ids(&self, ids: &[u64]) -> Result<Vec<Entry>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let csv = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let builder = self
                .transport
                .request(Method::GET, &self.url("/v2/entries.json"))
                .query(&[("ids", csv.as_str()), ("mode", "extended")]);
            let response = self.transport.send(builder).await?.require_success()?;
            entries.extend(decode_entries(&response.body, "/v2/entries.json?ids")?);
        }
        Ok(entries)
    }

    /// First page of entries for one feed, newest first.
    pub async fn entries_for_feed(&self, feed_id: u64) -> Result<EntryPage, ApiError> {
        let per_page = self.per_page.to_string();
        let builder = self
            .transport
            .request(
                Method::GET,
                &self.url(&format!("/v2/feeds/{}/entries.json", feed_id)),
            )
            .query(&[("mode", "extended"), ("per_page", per_page.as_str())]);
        let response = self.transport.send(builder).await?.require_success()?;
        let links = page_links(&response);
        Ok(EntryPage {
            entries: decode_entries(&response.body, "feed entries")?,
            last_page_number: links.last_page_number(),
            next_page: links.next,
        })
    }

    /// First page of the account-wide incremental entry fetch.
    ///
    /// The `since` lower bound follows the backdate policy (see
    /// [`since_window`]): 3 months on first sync, and periodically one day
    /// before the previous sync to catch server-side edits. On success the
    /// sync start time is recorded from the response `Date` header.
    pub async fn entries_since(&self) -> Result<EntryPage, ApiError> {
        let last_fetch = self
            .transport
            .with_metadata(|meta| meta.last_article_fetch_start_time);
        let window = {
            let mut backdate = self
                .last_backdate_start
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let window = since_window(Utc::now(), last_fetch, *backdate);
            if let Some(recorded) = window.record_backdate {
                *backdate = Some(recorded);
            }
            window
        };

        tracing::debug!(
            since = %window.since,
            backdated = window.record_backdate.is_some(),
            "Starting incremental entry fetch"
        );

        let per_page = self.per_page.to_string();
        let since = window.since.to_rfc3339_opts(SecondsFormat::Micros, true);
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/entries.json"))
            .query(&[
                ("mode", "extended"),
                ("per_page", per_page.as_str()),
                ("since", since.as_str()),
            ]);
        let response = self.transport.send(builder).await?.require_success()?;

        let links = page_links(&response);
        let entries = decode_entries(&response.body, "/v2/entries.json")?;

        // Recorded only once the page decoded: an undeliverable page must
        // not advance the window past entries we never received. The next
        // sync starts where the server says this one did; local clocks can
        // disagree with the service by minutes.
        let fetch_start = response
            .header("Date")
            .and_then(parse_http_date)
            .unwrap_or_else(Utc::now);
        self.transport
            .with_metadata(|meta| meta.last_article_fetch_start_time = Some(fetch_start));

        Ok(EntryPage {
            entries,
            last_page_number: links.last_page_number(),
            next_page: links.next,
        })
    }

    /// Fetch one page by its opaque cursor URL from a previous page's
    /// `Link` header.
    ///
    /// The cursor must stay on the configured service origin: every request
    /// carries Basic auth, so a foreign `Link` target is rejected rather
    /// than followed.
    pub async fn entries_page(&self, page_url: &str) -> Result<EntryPage, ApiError> {
        if !is_same_origin(&self.base_url, page_url) {
            tracing::error!(url = %page_url, "Rejecting off-origin pagination URL");
            return Err(ApiError::ForeignPaginationUrl(page_url.to_string()));
        }
        let builder = self.transport.request(Method::GET, page_url);
        let response = self.transport.send(builder).await?.require_success()?;
        let links = page_links(&response);
        Ok(EntryPage {
            entries: decode_entries(&response.body, "entries page")?,
            last_page_number: links.last_page_number(),
            next_page: links.next,
        })
    }

    // ========================================================================
    // Unread / starred state
    // ========================================================================

    /// All unread entry IDs. `Ok(None)` on 304.
    pub async fn unread_entry_ids(&self) -> Result<Option<Vec<u64>>, ApiError> {
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/unread_entries.json"));
        match self
            .transport
            .send_cached(builder, CacheResource::UnreadEntries)
            .await?
        {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    pub async fn mark_unread(&self, ids: &[u64]) -> Result<(), ApiError> {
        self.update_state_list("/v2/unread_entries.json", "unread_entries", Method::POST, ids)
            .await
    }

    pub async fn mark_read(&self, ids: &[u64]) -> Result<(), ApiError> {
        self.update_state_list(
            "/v2/unread_entries.json",
            "unread_entries",
            Method::DELETE,
            ids,
        )
        .await
    }

    /// All starred entry IDs. `Ok(None)` on 304.
    pub async fn starred_entry_ids(&self) -> Result<Option<Vec<u64>>, ApiError> {
        let builder = self
            .transport
            .request(Method::GET, &self.url("/v2/starred_entries.json"));
        match self
            .transport
            .send_cached(builder, CacheResource::StarredEntries)
            .await?
        {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    pub async fn star(&self, ids: &[u64]) -> Result<(), ApiError> {
        self.update_state_list(
            "/v2/starred_entries.json",
            "starred_entries",
            Method::POST,
            ids,
        )
        .await
    }

    pub async fn unstar(&self, ids: &[u64]) -> Result<(), ApiError> {
        self.update_state_list(
            "/v2/starred_entries.json",
            "starred_entries",
            Method::DELETE,
            ids,
        )
        .await
    }

    /// Shared shape of the unread/starred state endpoints: a JSON body with
    /// one key holding an ID list, POST to set and DELETE (with body) to
    /// clear. Empty lists are a no-op.
    async fn update_state_list(
        &self,
        path: &str,
        key: &str,
        method: Method,
        ids: &[u64],
    ) -> Result<(), ApiError> {
        if ids.is_empty() {
            return Ok(());
        }
        let builder = self
            .transport
            .request(method, &self.url(path))
            .json(&serde_json::json!({ key: ids }));
        self.transport.send(builder).await?.require_success()?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn page_links(response: &crate::transport::Response) -> PageLinks {
    response
        .header("Link")
        .map(parse_link_header)
        .unwrap_or_default()
}

/// True when both URLs parse and share scheme, host, and port.
fn is_same_origin(base: &str, candidate: &str) -> bool {
    match (url::Url::parse(base), url::Url::parse(candidate)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

/// Tagging ID from a `Location` header like
/// `https://api.feedbin.com/v2/taggings/4.json`: the trailing path segment
/// with its `.json` suffix stripped.
fn id_from_location(location: &str) -> Option<u64> {
    let segment = location.rsplit('/').next()?;
    let segment = segment.strip_suffix(".json").unwrap_or(segment);
    segment.parse().ok()
}

/// Decode a page of entries, dropping malformed ones individually.
///
/// A page is an array; one bad element (unexpected shape, missing IDs)
/// should not discard its 99 siblings. Drops are counted and logged at
/// warn so persistent decode problems stay visible.
fn decode_entries(body: &[u8], context: &str) -> Result<Vec<Entry>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::NoData);
    }
    let values: Vec<serde_json::Value> = serde_json::from_slice(body)?;

    let total = values.len();
    let entries: Vec<Entry> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed entry");
                None
            }
        })
        .collect();

    let dropped = total - entries.len();
    if dropped > 0 {
        tracing::warn!(
            dropped = dropped,
            total = total,
            context = context,
            "Dropped entries that failed to decode"
        );
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_same_origin() {
        assert!(is_same_origin(
            "https://api.feedbin.com",
            "https://api.feedbin.com/v2/entries.json?page=2"
        ));
        assert!(is_same_origin(
            "http://127.0.0.1:8080",
            "http://127.0.0.1:8080/v2/entries.json"
        ));
        assert!(!is_same_origin(
            "https://api.feedbin.com",
            "https://evil.example.com/v2/entries.json"
        ));
        assert!(!is_same_origin(
            "https://api.feedbin.com",
            "http://api.feedbin.com/v2/entries.json"
        ));
        assert!(!is_same_origin(
            "http://127.0.0.1:8080",
            "http://127.0.0.1:9090/v2/entries.json"
        ));
        assert!(!is_same_origin("https://api.feedbin.com", "not a url"));
    }

    #[test]
    fn test_id_from_location() {
        assert_eq!(
            id_from_location("https://api.feedbin.com/v2/taggings/4.json"),
            Some(4)
        );
        assert_eq!(
            id_from_location("https://api.feedbin.com/v2/taggings/12345"),
            Some(12345)
        );
        assert_eq!(id_from_location("https://api.feedbin.com/v2/taggings/"), None);
        assert_eq!(id_from_location("not-a-url"), None);
    }

    #[test]
    fn test_decode_entries_drops_malformed() {
        let body = br#"[
            {"id": 1, "feed_id": 2, "title": "ok"},
            {"this": "is not an entry"},
            {"id": 3, "feed_id": 2}
        ]"#;
        let entries = decode_entries(body, "test").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].id, 3);
    }

    #[test]
    fn test_decode_entries_whole_body_malformed_is_error() {
        assert!(matches!(
            decode_entries(b"not json", "test"),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            decode_entries(b"", "test"),
            Err(ApiError::NoData)
        ));
    }

    #[test]
    fn test_decode_entries_empty_array() {
        let entries = decode_entries(b"[]", "test").unwrap();
        assert!(entries.is_empty());
    }
}
