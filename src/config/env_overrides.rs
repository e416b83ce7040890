use super::settings::Config;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Apply environment-variable overrides to `config`
///
/// `lookup` resolves a variable name to its value; blank values are ignored.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` when a numeric variable does not parse.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(site) = get("DD_SITE") {
        config.datadog.site = site;
    }
    if let Some(api_key) = get("DD_API_KEY") {
        config.datadog.api_key = api_key;
    }
    if let Some(app_key) = get("DD_APP_KEY") {
        config.datadog.app_key = app_key;
    }

    if let Some(port) = parse_var(&get, "PORT")? {
        config.server.port = port;
    }

    if let Some(interval) = parse_var(&get, "POLL_INTERVAL_SEC")? {
        config.polling.interval_seconds = interval;
    }
    if let Some(window) = parse_var(&get, "LOGS_WINDOW_MIN")? {
        config.polling.logs_window_minutes = window;
    }
    if let Some(max) = parse_var(&get, "MAX_LOGS_PER_QUERY")? {
        config.polling.max_logs_per_query = max;
    }

    if let Some(dir) = get("DATA_DIR") {
        config.paths.data_dir = PathBuf::from(dir);
    }
    if let Some(file) = get("LINKS_FILE") {
        config.paths.links_file = PathBuf::from(file);
    }

    Ok(())
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_all_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("DD_SITE", "us5.datadoghq.com"),
                ("DD_API_KEY", "api"),
                ("DD_APP_KEY", "app"),
                ("PORT", "9090"),
                ("POLL_INTERVAL_SEC", "120"),
                ("LOGS_WINDOW_MIN", "10"),
                ("MAX_LOGS_PER_QUERY", "250"),
                ("DATA_DIR", "/tmp/out"),
                ("LINKS_FILE", "/etc/ddwatch/links.json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.datadog.site, "us5.datadoghq.com");
        assert_eq!(config.datadog.api_key, "api");
        assert_eq!(config.datadog.app_key, "app");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.polling.interval_seconds, 120);
        assert_eq!(config.polling.logs_window_minutes, 10);
        assert_eq!(config.polling.max_logs_per_query, 250);
        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.paths.links_file, PathBuf::from("/etc/ddwatch/links.json"));
    }

    #[test]
    fn test_blank_values_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, lookup(&[("DD_SITE", "  "), ("PORT", "")])).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_number() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, lookup(&[("POLL_INTERVAL_SEC", "five")]));

        match result {
            Err(ConfigError::ParseError(message)) => assert!(message.contains("POLL_INTERVAL_SEC")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
