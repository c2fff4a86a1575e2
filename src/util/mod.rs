//! Pure helpers shared by the API caller.
//!
//! - **Link parsing**: pagination cursors and page counts from RFC 5988
//!   `Link` headers
//! - **HTTP dates**: `Date` response headers as UTC timestamps
//!
//! No network or state side effects; these drive the caller's multi-page
//! fetch loops and timestamp the start of an entry-sync session.

mod http_date;
mod link;

pub use http_date::parse_http_date;
pub use link::{page_number, parse_link_header, PageLinks};
