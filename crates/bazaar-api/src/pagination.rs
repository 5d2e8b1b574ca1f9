use bazaar_types::api::Page;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

/// Page-number pagination over an already-filtered result set. Pages are
/// 1-indexed; a non-positive page or a page past the end is an error, not
/// an empty result (page 1 of an empty set is still valid). `page_size`
/// is clamped to [1, MAX_PAGE_SIZE]. Navigation links preserve the
/// caller's other query parameters.
pub fn paginate<T>(
    items: Vec<T>,
    page: usize,
    page_size: usize,
    path: &str,
    base_params: &[(String, String)],
) -> Result<Page<T>, ApiError> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

    if page == 0 {
        return Err(ApiError::NotFound("Invalid page."));
    }

    let count = items.len();
    let total_pages = count.div_ceil(page_size).max(1);
    if page > total_pages {
        return Err(ApiError::NotFound("Invalid page."));
    }

    let results: Vec<T> = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    let link = |p: usize| page_link(path, base_params, p);

    Ok(Page {
        count,
        next: (page < total_pages).then(|| link(page + 1)),
        previous: (page > 1).then(|| link(page - 1)),
        results,
    })
}

fn page_link(path: &str, base_params: &[(String, String)], page: usize) -> String {
    let mut query = String::new();
    for (key, value) in base_params {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&encode(key));
        query.push('=');
        query.push_str(&encode(value));
    }
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str("page=");
    query.push_str(&page.to_string());

    format!("{path}?{query}")
}

/// Minimal percent-encoding for query components: RFC 3986 unreserved
/// characters pass through, everything else is escaped.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
