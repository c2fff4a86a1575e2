//! Account-synchronization layer for an RSS reader.
//!
//! Talks to a hosted feed-aggregation service (Feedbin v2) and hands decoded
//! subscriptions, tags, and entries to a persistence layer above. Three
//! pieces:
//!
//! - [`feedbin`] - the API caller: one method per remote endpoint, with
//!   conditional GET (ETag/Last-Modified), request pacing, cursor
//!   pagination, and cooperative suspend/resume
//! - [`sync`] - composable async operations with dependency graphs,
//!   bounded concurrency, and cascade cancellation
//! - [`account`] - per-account metadata: the conditional-GET validator
//!   store and incremental-fetch timing
//!
//! Out of scope: UI, the article database, OPML parsing, and credential
//! storage. Those live with the account owner.

pub mod account;
pub mod config;
pub mod credentials;
pub mod feedbin;
pub mod sync;
pub mod transport;
pub mod util;

pub use account::AccountMetadata;
pub use config::Config;
pub use credentials::Credentials;
pub use feedbin::FeedbinClient;
pub use transport::ApiError;
