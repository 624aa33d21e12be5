use crate::filter::DEFAULT_SELF_PREFIX;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    // History file; defaults to ~/.cmdlog/history.db
    pub path: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    // Commands starting with this are the tool calling itself
    pub self_prefix: String,
    pub default_limit: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: String,
    // Columns for `list` when --fmt is not given
    pub columns: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            path: None,
            retry_attempts: retry.max_attempts,
            retry_base_ms: retry.base_backoff.as_millis() as u64,
            retry_max_ms: retry.max_backoff.as_millis() as u64,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            self_prefix: DEFAULT_SELF_PREFIX.to_string(),
            default_limit: 1,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            columns: "timestamp,status,durs,cmd".to_string(),
        }
    }
}

impl Config {
    /// Load `~/.cmdlog/config.toml`; a missing file means defaults.
    pub fn new() -> Result<Self> {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", config_path.display()))?;
        Ok(config)
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cmdlog")
    }

    fn get_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// `--db` flag, then `CMDLOG_DB`, then the config file, then the default location.
    pub fn resolve_db_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| std::env::var_os("CMDLOG_DB").map(PathBuf::from))
            .or_else(|| self.storage.path.clone())
            .unwrap_or_else(|| Self::base_dir().join("history.db"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.storage.retry_attempts,
            Duration::from_millis(self.storage.retry_base_ms),
            Duration::from_millis(self.storage.retry_max_ms),
        )
    }

    /// `display.language`, or for "auto" the first of `CMDLOG_LANG`, `LC_ALL`, `LANG`.
    pub fn get_effective_language(&self) -> String {
        self.language_from(|name| std::env::var(name).ok())
    }

    fn language_from(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        if self.display.language != "auto" {
            return self.display.language.clone();
        }
        ["CMDLOG_LANG", "LC_ALL", "LANG"]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
            .map(|locale| locale.split('.').next().unwrap_or_default().to_string())
            .unwrap_or_else(|| "en".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.query.self_prefix, "cmdlog");
        assert_eq!(config.query.default_limit, 1);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[storage]\npath = \"/var/tmp/h.db\"\nretry_attempts = 3\n\n[query]\nself_prefix = \"hist\"\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage.path, Some(PathBuf::from("/var/tmp/h.db")));
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.storage.retry_base_ms, 5);
        assert_eq!(config.query.self_prefix, "hist");
        assert_eq!(config.display.columns, "timestamp,status,durs,cmd");
        assert_eq!(config.resolve_db_path(Some(PathBuf::from("/x.db"))), PathBuf::from("/x.db"));
    }

    #[test]
    fn language_prefers_tool_variable_over_locale() {
        let auto = Config::default();
        let env = |vars: &'static [(&'static str, &'static str)]| {
            move |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
        };
        assert_eq!(auto.language_from(env(&[("CMDLOG_LANG", "zh_CN"), ("LANG", "en_US.UTF-8")])), "zh_CN");
        assert_eq!(auto.language_from(env(&[("LC_ALL", "C"), ("LANG", "zh_TW.UTF-8")])), "zh_TW");
        assert_eq!(auto.language_from(env(&[])), "en");

        let mut fixed = Config::default();
        fixed.display.language = "zh".to_string();
        assert_eq!(fixed.language_from(env(&[("CMDLOG_LANG", "en")])), "zh");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[storage\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
