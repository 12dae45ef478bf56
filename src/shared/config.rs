use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            user_agent: default_user_agent(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Characters of message body shown per email.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
        }
    }
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config at {}: {}", path.display(), e))?;
        let mut config: AppConfig = serde_json::from_str(&data)
            .map_err(|e| anyhow!("Failed to parse config JSON at {}: {}", path.display(), e))?;

        config.server.host = config.server.host.trim().to_string();
        if config.server.host.is_empty() {
            config.server.host = default_host();
        }

        config.logging.dir = config.logging.dir.trim().to_string();
        if config.logging.dir.is_empty() {
            config.logging.dir = default_log_dir();
        }

        config.web_search.endpoint = config.web_search.endpoint.trim().to_string();
        if config.web_search.endpoint.is_empty() {
            config.web_search.endpoint = default_search_endpoint();
        }
        if config.web_search.max_results == 0 {
            return Err(anyhow!("web_search.max_results must be at least 1"));
        }

        Ok(config)
    }

    /// Load from an explicit path, or from the default location when it
    /// exists. Missing default config means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = path {
            let path = expand_path(&path.to_string_lossy());
            return Ok((Self::load_from_path(&path)?, Some(path)));
        }
        let path = default_config_path();
        if path.exists() {
            return Ok((Self::load_from_path(&path)?, Some(path)));
        }
        Ok((Self::default(), None))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9410
}

fn default_log_dir() -> String {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apple-tools")
        .join("logs")
        .to_string_lossy()
        .into_owned()
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_search_timeout() -> u64 {
    15
}

fn default_preview_chars() -> usize {
    500
}

fn expand_path(input: &str) -> PathBuf {
    if let Some(stripped) = input.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(input)
}

fn default_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apple-tools")
        .join("config.json")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_sections_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "server": {{ "port": 9999 }} }}"#).unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.web_search.max_results, 10);
        assert_eq!(config.mail.preview_chars, 500);
    }

    #[test]
    fn test_blank_values_are_defaulted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "server": {{ "host": "  " }}, "web_search": {{ "endpoint": "" }} }}"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.web_search.endpoint, default_search_endpoint());
    }

    #[test]
    fn test_zero_max_results_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "web_search": {{ "max_results": 0 }} }}"#).unwrap();

        assert!(AppConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config JSON"));
    }
}
