//! Parsing for RFC 5988 `Link` response headers.
//!
//! Feedbin paginates entry listings by returning a `Link` header of the form:
//!
//! ```text
//! <https://api.feedbin.com/v2/entries.json?page=2>; rel="next",
//! <https://api.feedbin.com/v2/entries.json?page=5>; rel="last"
//! ```
//!
//! The "next" URL is the paging cursor the caller walks until it disappears;
//! the "last" URL carries the total page count in its `page=` parameter.

/// Pagination links extracted from a `Link` header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageLinks {
    /// URL of the next page, if any. Absent on the final page.
    pub next: Option<String>,
    /// URL of the last page, if the server reported one.
    pub last: Option<String>,
}

impl PageLinks {
    /// Page index of the last page, parsed from the `rel="last"` link.
    pub fn last_page_number(&self) -> Option<u32> {
        self.last.as_deref().and_then(page_number)
    }
}

/// Parse a `Link` header value into next/last page URLs.
///
/// Entries are comma-separated `<url>; rel="name"` pairs. Relations other
/// than `next` and `last` are ignored. Malformed entries (missing angle
/// brackets or rel parameter) are skipped rather than failing the header.
pub fn parse_link_header(value: &str) -> PageLinks {
    let mut links = PageLinks::default();

    for part in value.split(',') {
        let part = part.trim();

        let url = match part.find('<').zip(part.find('>')) {
            Some((open, close)) if open < close => &part[open + 1..close],
            _ => continue,
        };

        let rel = part
            .split(';')
            .skip(1)
            .map(str::trim)
            .find_map(|param| param.strip_prefix("rel="))
            .map(|rel| rel.trim_matches('"'));

        match rel {
            Some("next") => links.next = Some(url.to_string()),
            Some("last") => links.last = Some(url.to_string()),
            _ => {}
        }
    }

    links
}

/// Extract the integer page index from a link's `page=` query parameter.
///
/// Handles both `&`-terminated (`...page=3&mode=extended`) and
/// `>`-terminated (`<...page=7>`, the raw RFC 5988 bracket form) links.
/// Returns `None` when there is no `page=` parameter or the value is not
/// an unsigned integer.
pub fn page_number(link: &str) -> Option<u32> {
    // Match `page=` only at a parameter boundary so `per_page=100` (present
    // in every Feedbin listing URL) is not mistaken for the page index.
    let mut search_from = 0;
    let start = loop {
        let found = link[search_from..].find("page=")? + search_from;
        let at_boundary = matches!(
            link[..found].chars().next_back(),
            None | Some('?') | Some('&') | Some('<')
        );
        if at_boundary {
            break found + "page=".len();
        }
        search_from = found + "page=".len();
    };

    let rest = &link[start..];
    let end = rest
        .find(|c| c == '&' || c == '>')
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
