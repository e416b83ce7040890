//! Search query derivation for link items
//!
//! A target's query comes either from its explicit `query` field or from the
//! `query` parameter of its saved-search link. Queries that do not already
//! filter by status are restricted to error and critical entries.

use super::source::LinkItem;
use url::Url;

/// Filter appended to queries that carry no status clause of their own
pub const DEFAULT_STATUS_FILTER: &str = "status:error OR status:critical";

// `status:` subsumes the others; the full list documents the intended matches.
const STATUS_MARKERS: [&str; 6] = [
    "status:error",
    "status:critical",
    "status:warn",
    "status:info",
    "@status:",
    "status:",
];

/// Whether the query already filters by status (case-insensitive substring match)
pub fn has_status_filter(query: &str) -> bool {
    let lower = query.to_lowercase();
    STATUS_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Restrict a query to error/critical entries unless it already filters by status
///
/// # Examples
///
/// ```
/// use ddwatch::links::with_error_filter;
///
/// assert_eq!(
///     with_error_filter("source:app"),
///     "(source:app) AND (status:error OR status:critical)"
/// );
/// assert_eq!(with_error_filter("source:app status:warn"), "source:app status:warn");
/// ```
pub fn with_error_filter(query: &str) -> String {
    if has_status_filter(query) {
        return query.to_string();
    }
    format!("({}) AND ({})", query, DEFAULT_STATUS_FILTER)
}

/// Extract the `query` parameter from a saved-search link
///
/// The parameter is form-decoded by the URL parser and then percent-decoded once
/// more, so double-encoded links resolve to plain text. Unparsable links, a
/// missing parameter, or a value that does not decode to UTF-8 yield an empty string.
pub fn extract_query_from_link(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        return String::new();
    };

    let Some(value) = url
        .query_pairs()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.into_owned())
    else {
        return String::new();
    };

    match urlencoding::decode(&value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::new(),
    }
}

/// Raw query for an item before the status filter is applied
///
/// A non-blank `query` wins (trimmed) and the link is ignored entirely.
pub fn resolve_raw_query(item: &LinkItem) -> String {
    match item.query.as_deref().map(str::trim) {
        Some(query) if !query.is_empty() => query.to_string(),
        _ => extract_query_from_link(item.link.as_deref().unwrap_or("")),
    }
}

/// Final search query for an item, or `None` when it has nothing to search for
pub fn resolve_query(item: &LinkItem) -> Option<String> {
    let raw = resolve_raw_query(item);
    if raw.is_empty() {
        return None;
    }
    Some(with_error_filter(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(query: Option<&str>, link: Option<&str>) -> LinkItem {
        LinkItem {
            org_key: Some("o1".to_string()),
            connector_name: Some("svc-sub-v1".to_string()),
            link: link.map(str::to_string),
            query: query.map(str::to_string),
        }
    }

    #[test]
    fn test_default_filter_applied() {
        assert_eq!(
            resolve_query(&item(Some("source:app"), None)),
            Some("(source:app) AND (status:error OR status:critical)".to_string())
        );
    }

    #[test]
    fn test_existing_status_filter_kept() {
        for query in [
            "service:api status:error",
            "service:api STATUS:Critical",
            "service:api @status:warn",
            "service:api status:info",
            "service:api -status:ok",
            "substatus:foo",
        ] {
            assert_eq!(with_error_filter(query), query);
        }
    }

    #[test]
    fn test_explicit_query_trimmed_and_overrides_link() {
        let resolved = resolve_query(&item(
            Some("  source:app  "),
            Some("https://app.datadoghq.com/logs?query=service%3Aother"),
        ));
        assert_eq!(
            resolved,
            Some("(source:app) AND (status:error OR status:critical)".to_string())
        );
    }

    #[test]
    fn test_blank_query_falls_back_to_link() {
        let resolved = resolve_query(&item(
            Some("   "),
            Some("https://app.datadoghq.com/logs?query=service%3Aapi%20status%3Aerror&from_ts=1"),
        ));
        assert_eq!(resolved, Some("service:api status:error".to_string()));
    }

    #[test]
    fn test_extract_query_from_link() {
        assert_eq!(
            extract_query_from_link("https://app.datadoghq.com/logs?query=service%3Aapi+env%3Aprod"),
            "service:api env:prod"
        );
        assert_eq!(
            extract_query_from_link("https://app.datadoghq.com/logs?query=service%253Aapi"),
            "service:api"
        );
        assert_eq!(extract_query_from_link("https://app.datadoghq.com/logs?q=x"), "");
        assert_eq!(extract_query_from_link("not a url"), "");
        assert_eq!(extract_query_from_link(""), "");
    }

    #[test]
    fn test_first_query_parameter_wins() {
        assert_eq!(
            extract_query_from_link("https://app.datadoghq.com/logs?query=a&query=b"),
            "a"
        );
    }

    #[test]
    fn test_nothing_to_search_is_skipped() {
        assert_eq!(resolve_query(&item(None, None)), None);
        assert_eq!(resolve_query(&item(Some(""), Some("not a url"))), None);
        assert_eq!(
            resolve_query(&item(None, Some("https://app.datadoghq.com/logs?query="))),
            None
        );
    }
}
