/// Placeholder reported for connector names that do not follow the
/// `prefix-subsystem-suffix` convention
pub const NO_CONNECTOR_NAME: &str = "no connector name";

/// Resolve the display name used for a target's connector
///
/// Names with more than two dash-separated parts are kept as-is; anything else
/// (including legitimate two-part names) maps to [`NO_CONNECTOR_NAME`].
/// Downstream consumers match on the placeholder, so the rule stays literal.
pub fn resolve_connector_name(connector_name: &str) -> String {
    if connector_name.split('-').count() > 2 {
        connector_name.to_string()
    } else {
        NO_CONNECTOR_NAME.to_string()
    }
}
