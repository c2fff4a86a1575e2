//! Account-scoped sync state: conditional-GET validators and fetch timing.
//!
//! The account object owns this metadata and its persistence; the API caller
//! holds a shared handle and mutates it only after successful responses.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Conditional-GET store
// ============================================================================

/// Logical resources cached via conditional GET.
///
/// Each maps to one key in the validator store. Key strings are part of the
/// persisted metadata format and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheResource {
    Subscriptions,
    Tags,
    Taggings,
    UnreadEntries,
    StarredEntries,
}

impl CacheResource {
    pub fn key(self) -> &'static str {
        match self {
            CacheResource::Subscriptions => "subscriptions",
            CacheResource::Tags => "tags",
            CacheResource::Taggings => "taggings",
            CacheResource::UnreadEntries => "unreadEntries",
            CacheResource::StarredEntries => "starredEntries",
        }
    }
}

/// Snapshot of validator headers captured from a response.
///
/// Immutable once stored: a new successful fetch replaces the whole entry
/// for its key, never merges fields into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalGetInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl ConditionalGetInfo {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

// ============================================================================
// Account metadata
// ============================================================================

/// Per-account sync metadata persisted between sessions.
///
/// The serialization format is owned by the account layer above us; this
/// struct only has to round-trip through serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountMetadata {
    /// Validator headers per cacheable resource key. At most one entry per
    /// key; see [`ConditionalGetInfo`].
    #[serde(rename = "conditionalGetInfo", default)]
    pub conditional_get_info: HashMap<String, ConditionalGetInfo>,

    /// Start time of the last successful entry sync, taken from the response
    /// `Date` header where available.
    #[serde(rename = "lastArticleFetchStartTime", skip_serializing_if = "Option::is_none")]
    pub last_article_fetch_start_time: Option<DateTime<Utc>>,
}

impl AccountMetadata {
    pub fn validators(&self, resource: CacheResource) -> Option<&ConditionalGetInfo> {
        self.conditional_get_info.get(resource.key())
    }

    /// Overwrite the stored validators for one resource. Empty validators
    /// clear the entry so a later fetch is unconditional.
    pub fn store_validators(&mut self, resource: CacheResource, info: ConditionalGetInfo) {
        if info.is_empty() {
            self.conditional_get_info.remove(resource.key());
        } else {
            self.conditional_get_info.insert(resource.key().to_string(), info);
        }
    }
}

// ============================================================================
// Incremental-fetch window
// ============================================================================

/// Outcome of the since-window computation for an entry sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinceWindow {
    /// Lower bound of the fetch window, sent as `since=`.
    pub since: DateTime<Utc>,
    /// When set, the caller should record a backdate event at this time
    /// before issuing the request.
    pub record_backdate: Option<DateTime<Utc>>,
}

/// Compute the `since` lower bound for an incremental entry fetch.
///
/// Policy:
/// - no prior fetch timestamp: last 3 months;
/// - prior fetch at `T`, no backdate recorded yet: `T - 1 day`, recording a
///   backdate event at `T`;
/// - backdate recorded more than 1 day before `T`: `T - 1 day` again,
///   refreshing the backdate event;
/// - otherwise: plain `T`.
///
/// The widened window catches server-side edits to already-fetched articles
/// while bounding the extra transfer to one backdated fetch per rolling day.
pub fn since_window(
    now: DateTime<Utc>,
    last_fetch_start: Option<DateTime<Utc>>,
    last_backdate_start: Option<DateTime<Utc>>,
) -> SinceWindow {
    let Some(last_fetch) = last_fetch_start else {
        let since = now
            .checked_sub_months(Months::new(3))
            .unwrap_or(now - Duration::days(90));
        return SinceWindow {
            since,
            record_backdate: None,
        };
    };

    let should_backdate = match last_backdate_start {
        None => true,
        Some(backdate) => backdate + Duration::days(1) < last_fetch,
    };

    if should_backdate {
        SinceWindow {
            since: last_fetch - Duration::days(1),
            record_backdate: Some(last_fetch),
        }
    } else {
        SinceWindow {
            since: last_fetch,
            record_backdate: None,
        }
    }
}
