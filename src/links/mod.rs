/// Link source loading (`links.json`)
pub mod source;

/// Search query derivation and the default status filter
pub mod query;

/// Connector display-name policy
pub mod connector;

pub use connector::{resolve_connector_name, NO_CONNECTOR_NAME};
pub use query::{extract_query_from_link, resolve_query, with_error_filter};
pub use source::{parse_links, FileLinkSource, LinkItem, LinkSource};

#[cfg(test)]
pub use source::MockLinkSource;
