//! Configuration loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.bidwatch`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.max_attempts, 3);
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [browser]
            endpoint = "http://127.0.0.1:9333"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.browser.endpoint, "http://127.0.0.1:9333");
    }

    #[test]
    fn test_load_selector_overrides() {
        let content = r##"
            [selectors.fields]
            current_bid = ["#bid-now", ".price"]

            [selectors.elements]
            plus_button = ["button.increment"]
        "##;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.selectors.fields.current_bid, vec!["#bid-now", ".price"]);
        assert_eq!(config.selectors.elements.plus_button, vec!["button.increment"]);
        // Untouched tables keep their defaults.
        assert!(!config.selectors.elements.bid_button.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[reconciler]").unwrap();
        writeln!(file, "coalesce_window_ms = 200").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.reconciler.coalesce_window_ms, 200);
    }

    #[test]
    fn test_shipped_default_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = ConfigLoader::load(&path).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.hub.connection_queue, defaults.hub.connection_queue);
        assert_eq!(config.actions.timeout_ms, defaults.actions.timeout_ms);
        assert_eq!(
            config.reconciler.staleness_window_secs,
            defaults.reconciler.staleness_window_secs
        );
        assert_eq!(config.selectors.elements.bid_button, defaults.selectors.elements.bid_button);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/bidwatch.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/bidwatch.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable name, not read elsewhere
        unsafe {
            std::env::set_var("BIDWATCH_TEST_BASE_URL", "https://auctions.example.com");
        }
        let content = "[session]\nsite_base_url = \"${BIDWATCH_TEST_BASE_URL}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(
            config.session.site_base_url.as_deref(),
            Some("https://auctions.example.com")
        );
        unsafe {
            std::env::remove_var("BIDWATCH_TEST_BASE_URL");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${BIDWATCH_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/.bidwatch/logs");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/.bidwatch/logs"));
    }
}
