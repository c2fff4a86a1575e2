//! Wire DTOs for the Feedbin v2 JSON API.
//!
//! Transient, decoded per request; identity is the remote service's IDs.
//! These are handed straight to the persistence layer above us, so they
//! mirror the wire field names rather than any internal article model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed the account is subscribed to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscription {
    pub id: u64,
    pub feed_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    pub feed_url: String,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One candidate feed returned when a subscription request is ambiguous
/// (HTTP 300: the page offered more than one feed).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionChoice {
    pub feed_url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Outcome of a create-subscription call, disambiguated by HTTP status.
///
/// 401 and 404 on this endpoint are meaningful application states, not
/// transport faults, and decode to variants rather than errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateSubscriptionResult {
    /// 201: newly created.
    Created(Subscription),
    /// 300: ambiguous feed URL; pick one and retry.
    MultipleChoices(Vec<SubscriptionChoice>),
    /// 302 (or the documented 401 quirk): this account already has the feed.
    AlreadySubscribed,
    /// 404: no feed at that URL.
    NotFound,
}

/// A user-defined folder/tag name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
}

/// Assignment of one feed to one tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tagging {
    pub id: u64,
    pub feed_id: u64,
    pub name: String,
}

/// An article as served by the entries endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub feed_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A page of entries plus the cursor to the next one.
///
/// `next_page` is valid only for the current sync session; walk it until
/// it is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    pub next_page: Option<String>,
    /// Index of the final page, parsed from the `rel="last"` link when the
    /// server reports one. Only the first page of a listing carries it.
    pub last_page_number: Option<u32>,
}

/// State of a server-side OPML import job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportResult {
    pub id: u64,
    pub complete: bool,
}

/// Request body for renaming a tag across the account.
#[derive(Debug, Serialize)]
pub struct RenameTagBody<'a> {
    pub old_name: &'a str,
    pub new_name: &'a str,
}
