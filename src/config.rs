use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GlFetchError;
use crate::tokens::DEFAULT_TOKEN_CAPACITY;

/// Configuration file structure for glfetch.
///
/// Lets users keep the instance URL, project ids and transfer limits in a file
/// instead of repeating them on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab instance and transfer settings
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab instance base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Numeric ids of the projects to fetch
    #[serde(default)]
    pub projects: Vec<i64>,

    /// Maximum number of transfers in flight at once
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Longest idle wait between two polls of the transfer queue, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds; no timeout when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Maximum number of JSON tokens accepted per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per project and pipeline
    #[default]
    Text,
    Json,
    Table,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            projects: Vec::new(),
            max_connections: default_max_connections(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: None,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_max_connections() -> usize {
    8
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_tokens() -> usize {
    DEFAULT_TOKEN_CAPACITY
}

const CANDIDATES: [&str; 4] = ["glfetch.toml", "glfetch.json", "glfetch.yaml", "glfetch.yml"];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./glfetch.toml, ./glfetch.json, ./glfetch.yaml, ./glfetch.yml
    /// 3. `<user config dir>/glfetch/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        if let Some(config) = Self::load_from_dir(Path::new("."))? {
            return Ok(config);
        }

        if let Some(path) = user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// Load the first candidate configuration file found in `dir`.
    fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        for candidate in &CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Rejects settings the fetcher cannot run with.
    pub fn validate(&self) -> std::result::Result<(), GlFetchError> {
        let gitlab = &self.gitlab;
        if gitlab.max_connections == 0 {
            return Err(GlFetchError::Config(
                "max-connections must be at least 1".into(),
            ));
        }
        if gitlab.poll_interval_ms == 0 {
            return Err(GlFetchError::Config(
                "poll-interval-ms must be at least 1".into(),
            ));
        }
        if gitlab.max_tokens == 0 {
            return Err(GlFetchError::Config("max-tokens must be at least 1".into()));
        }
        if gitlab.request_timeout_secs == Some(0) {
            return Err(GlFetchError::Config(
                "request-timeout-secs must be at least 1".into(),
            ));
        }
        url::Url::parse(&gitlab.base_url)
            .map_err(|e| GlFetchError::Config(format!("Invalid base URL: {e}")))?;
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("glfetch").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gitlab.base_url, "https://gitlab.com");
        assert!(config.gitlab.projects.is_empty());
        assert_eq!(config.gitlab.max_connections, 8);
        assert_eq!(config.gitlab.poll_interval_ms, 1000);
        assert_eq!(config.gitlab.max_tokens, 10 * 1024);
        assert_eq!(config.gitlab.request_timeout_secs, None);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[gitlab]
base-url = "https://gitlab.example.com"
projects = [3472737, 278964]
max-connections = 4
request-timeout-secs = 30

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.gitlab.base_url, "https://gitlab.example.com");
        assert_eq!(config.gitlab.projects, vec![3_472_737, 278_964]);
        assert_eq!(config.gitlab.max_connections, 4);
        assert_eq!(config.gitlab.request_timeout_secs, Some(30));
        assert_eq!(config.gitlab.poll_interval_ms, 1000);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "gitlab": {
    "base-url": "https://gitlab.json.com",
    "poll-interval-ms": 250
  },
  "output": {
    "format": "table"
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.gitlab.base_url, "https://gitlab.json.com");
        assert_eq!(config.gitlab.poll_interval_ms, 250);
        assert_eq!(config.output.format, OutputFormat::Table);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(
            temp_file,
            "gitlab:\n  projects: [1, 2, 3]\n  max-tokens: 512\n"
        )
        .unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.gitlab.projects, vec![1, 2, 3]);
        assert_eq!(config.gitlab.max_tokens, 512);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = Config::load(Some(Path::new("nonexistent-glfetch.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_dir_candidates() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join("glfetch.yml"),
            "gitlab:\n  base-url: https://yml.example.com\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("glfetch.toml"),
            "[gitlab]\nbase-url = \"https://toml.example.com\"\n",
        )
        .unwrap();

        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.gitlab.base_url, "https://toml.example.com");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.gitlab.projects = vec![42];
        config.output.format = OutputFormat::Table;

        for name in ["out.toml", "out.json", "out.yaml"] {
            let path = temp_dir.path().join(name);
            config.save(&path).unwrap();
            let reloaded = Config::load_from_path(&path).unwrap();
            assert_eq!(reloaded.gitlab.projects, vec![42], "{name}");
            assert_eq!(reloaded.output.format, OutputFormat::Table, "{name}");
        }
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let mut config = Config::default();
        config.gitlab.max_connections = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max-connections"));

        let mut config = Config::default();
        config.gitlab.base_url = "gitlab".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("Invalid base URL"));

        let mut config = Config::default();
        config.gitlab.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }
}
