//! Feedbin v2 API client.
//!
//! - [`caller`] - One async method per remote endpoint, with suspend/resume,
//!   conditional GET, pacing, and cursor pagination
//! - [`models`] - Wire DTOs decoded from the service's JSON

mod caller;
mod models;

pub use caller::FeedbinClient;
pub use models::{
    CreateSubscriptionResult, Entry, EntryPage, ImportResult, Subscription, SubscriptionChoice,
    Tag, Tagging,
};
