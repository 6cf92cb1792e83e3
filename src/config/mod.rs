//! @acp:module "Configuration"
//! @acp:summary "Pipeline configuration loading and defaults"
//! @acp:domain cli
//! @acp:layer config

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GateError;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".version-gate.json";

/// @acp:summary "Main configuration structure"
/// @acp:lock normal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where supported versions come from
    #[serde(default)]
    pub source: SourceConfig,

    /// The Terraform module being patched
    #[serde(default)]
    pub module: ModuleConfig,

    /// Version-control target
    #[serde(default)]
    pub publish: PublishConfig,

    /// Recurring trigger settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// @acp:summary "Load config from a JSON file"
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| GateError::Config(format!("{}: {}", path.display(), e)))
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @acp:summary "Load from default location or fall back to defaults"
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_CONFIG_FILE).unwrap_or_default()
    }

    /// Variables file resolved against the repository root
    pub fn variables_file(&self) -> PathBuf {
        self.publish.repo.join(&self.module.variables_path)
    }
}

/// @acp:summary "Support-status source settings"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Endpoint returning release support data
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Upper bound on the whole query
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_source_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_source_url() -> String {
    "https://endoflife.date/api/v1/products/amazon-eks".to_string()
}

fn default_source_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("version-gate/{}", crate::VERSION)
}

/// @acp:summary "Patch target settings"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Variables file, relative to the repository root
    #[serde(default = "default_variables_path")]
    pub variables_path: PathBuf,

    /// Variable whose validation block holds the allow-list
    #[serde(default = "default_variable_name")]
    pub variable_name: String,

    /// Also rewrite the validation error message
    #[serde(default = "default_true")]
    pub rewrite_error_message: bool,

    /// `{versions}` is replaced by the comma-separated list
    #[serde(default = "default_error_message_template")]
    pub error_message_template: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            variables_path: default_variables_path(),
            variable_name: default_variable_name(),
            rewrite_error_message: true,
            error_message_template: default_error_message_template(),
        }
    }
}

fn default_variables_path() -> PathBuf {
    PathBuf::from("modules/eks/variables.tf")
}

fn default_variable_name() -> String {
    "cluster_version".to_string()
}

fn default_error_message_template() -> String {
    "The cluster_version must be one of: {versions}.".to_string()
}

fn default_true() -> bool {
    true
}

/// @acp:summary "Version-control publishing settings"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
    /// Repository root (working tree)
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Push after committing; false leaves the commit local
    #[serde(default = "default_true")]
    pub push: bool,

    /// Upper bound on fetch/push transfers
    #[serde(default = "default_publish_timeout")]
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            remote: default_remote(),
            branch: default_branch(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            push: true,
            timeout_secs: default_publish_timeout(),
        }
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_author_name() -> String {
    "version-gate".to_string()
}

fn default_author_email() -> String {
    "version-gate@users.noreply.github.com".to_string()
}

fn default_publish_timeout() -> u64 {
    30
}

/// @acp:summary "Recurring trigger settings"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Cadence between runs
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Lock file guaranteeing a single active run
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            lock_file: default_lock_file(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval() -> u64 {
    86_400
}

fn default_lock_file() -> PathBuf {
    PathBuf::from(".version-gate.lock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.module.variable_name, "cluster_version");
        assert_eq!(config.publish.branch, "main");
        assert!(config.publish.push);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"publish": {"branch": "trunk"}, "source": {"timeoutSecs": 3}}"#)
                .unwrap();
        assert_eq!(config.publish.branch, "trunk");
        assert_eq!(config.publish.remote, "origin");
        assert_eq!(config.source.timeout(), Duration::from_secs(3));
        assert!(config.source.url.contains("amazon-eks"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut config = Config::default();
        config.schedule.interval_secs = 60;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.schedule.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_variables_file_joins_repo() {
        let mut config = Config::default();
        config.publish.repo = PathBuf::from("/srv/infra");
        assert_eq!(
            config.variables_file(),
            PathBuf::from("/srv/infra/modules/eks/variables.tf")
        );
    }
}
