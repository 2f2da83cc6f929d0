//! Persistence agent configuration.
//!
//! Defaults match a stock Kubeflow install. Each watched kind carries its
//! own timeout and retry budget: Seldon deployments churn quickly and use a
//! short watch timeout, workflows a long one.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::retry::RetryConfig;
use crate::watch::ResourceKind;

/// Environment variable holding the namespace to watch.
pub const NAMESPACE_ENV: &str = "KF_PIPELINES_NAMESPACE";
/// Environment variable holding the default log directive.
pub const LOG_LEVEL_ENV: &str = "PIPESYNC_LOG_LEVEL";
/// Environment variable selecting `text` or `json` log output.
pub const LOG_FORMAT_ENV: &str = "PIPESYNC_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::invalid("log_format", format!("unknown format '{other}'"))),
        }
    }
}

/// One watched collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// API group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Plural resource name.
    pub plural: String,
    /// Optional label selector.
    #[serde(default)]
    pub label_selector: Option<String>,
    /// Server-side watch timeout; the session reopens the watch when it lapses.
    pub timeout_seconds: u64,
    /// Budget for consecutive failed sessions.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl WatchConfig {
    /// Argo workflows, 30 s watch timeout.
    #[must_use]
    pub fn workflows() -> Self {
        Self {
            group: "argoproj.io".into(),
            version: "v1alpha1".into(),
            plural: "workflows".into(),
            label_selector: None,
            timeout_seconds: 30,
            retry: RetryConfig::default(),
        }
    }

    /// Seldon deployments, 5 s watch timeout.
    #[must_use]
    pub fn seldon_deployments() -> Self {
        Self {
            group: "machinelearning.seldon.io".into(),
            version: "v1".into(),
            plural: "seldondeployments".into(),
            label_selector: None,
            timeout_seconds: 5,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the watch timeout.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the label selector.
    #[must_use]
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    /// The watch timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The resource kind in `namespace`.
    #[must_use]
    pub fn resource_kind(&self, namespace: &str) -> ResourceKind {
        let kind = ResourceKind::new(&*self.group, &*self.version, namespace, &*self.plural);
        match &self.label_selector {
            Some(selector) => kind.with_label_selector(selector.clone()),
            None => kind,
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.group.is_empty() || self.version.is_empty() || self.plural.is_empty() {
            return Err(ConfigError::invalid(field, "group, version and plural are required"));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                format!("{field}.timeout_seconds"),
                "must be positive",
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                format!("{field}.retry"),
                "base_delay_ms exceeds max_delay_ms",
            ));
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    "anonymous".into()
}

fn default_log_level() -> String {
    "info".into()
}

/// Configuration of the persistence agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Namespace holding workflows and Seldon deployments.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Default `tracing` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// The workflow watch.
    #[serde(default = "WatchConfig::workflows")]
    pub workflows: WatchConfig,
    /// The Seldon deployment watch.
    #[serde(default = "WatchConfig::seldon_deployments")]
    pub seldon: WatchConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            workflows: WatchConfig::workflows(),
            seldon: WatchConfig::seldon_deployments(),
        }
    }
}

impl AgentConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the log level directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Sets the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Replaces the workflow watch settings.
    #[must_use]
    pub fn with_workflows(mut self, workflows: WatchConfig) -> Self {
        self.workflows = workflows;
        self
    }

    /// Replaces the Seldon watch settings.
    #[must_use]
    pub fn with_seldon(mut self, seldon: WatchConfig) -> Self {
        self.seldon = seldon;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Loads a JSON file, then validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(namespace) = var(NAMESPACE_ENV) {
            self.namespace = namespace;
        }
        if let Some(level) = var(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        if let Some(format) = var(LOG_FORMAT_ENV) {
            self.log_format = format.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::invalid("namespace", "must not be empty"));
        }
        self.workflows.validate("workflows")?;
        self.seldon.validate("seldon")
    }

    /// The workflow collection.
    #[must_use]
    pub fn workflow_kind(&self) -> ResourceKind {
        self.workflows.resource_kind(&self.namespace)
    }

    /// The Seldon deployment collection.
    #[must_use]
    pub fn seldon_kind(&self) -> ResourceKind {
        self.seldon.resource_kind(&self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.namespace, "anonymous");
        assert_eq!(config.workflows.timeout(), Duration::from_secs(30));
        assert_eq!(config.seldon.timeout(), Duration::from_secs(5));
        assert_eq!(config.workflow_kind(), ResourceKind::workflows("anonymous"));
        assert_eq!(config.seldon_kind(), ResourceKind::seldon_deployments("anonymous"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (NAMESPACE_ENV, "kubeflow-user"),
            (LOG_LEVEL_ENV, "pipesync=debug"),
            (LOG_FORMAT_ENV, " JSON "),
        ]);
        let config = AgentConfig::default()
            .apply_env(|name| env.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.namespace, "kubeflow-user");
        assert_eq!(config.log_level, "pipesync=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.workflow_kind().namespace, "kubeflow-user");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let config = AgentConfig::default()
            .apply_env(|name| (name == NAMESPACE_ENV).then(|| "  ".to_string()))
            .unwrap();
        assert_eq!(config.namespace, "anonymous");
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let result = AgentConfig::default().apply_env(|name| (name == LOG_FORMAT_ENV).then(|| "xml".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"namespace": "ml", "seldon": {{"group": "machinelearning.seldon.io", "version": "v1",
                "plural": "seldondeployments", "label_selector": "team=ml", "timeout_seconds": 2,
                "retry": {{"max_attempts": 9}}}}}}"#
        )
        .unwrap();

        let config = AgentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.namespace, "ml");
        assert_eq!(config.workflows, WatchConfig::workflows());
        assert_eq!(config.seldon.timeout_seconds, 2);
        assert_eq!(config.seldon.retry.max_attempts, 9);
        assert_eq!(config.seldon_kind().label_selector.as_deref(), Some("team=ml"));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = AgentConfig::default().with_seldon(WatchConfig::seldon_deployments().with_timeout_seconds(0));
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::invalid("seldon.timeout_seconds", "must be positive")
        );
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = AgentConfig::from_json_file("/nonexistent/pipesync.json");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
