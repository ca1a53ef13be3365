//! # Participant Configuration
//!
//! Settings are read from YAML and may then be overridden from `PARTICIPANT_*`
//! environment variables. Only `cluster_name` and `instance_name` are required.
//!
//! ```yaml
//! cluster_name: riemann-cluster
//! instance_name: localhost_12918
//! coordination_address: localhost:2181
//! messaging:
//!   default_callback_timeout_ms: 30000
//! container:
//!   required_kind: container
//!   run_command: /bin/sh
//!   command: ./start-node.sh
//!   termination: graceful
//!   buffer_size: 32
//! ```
//!
//! | Variable                            | Field                                   |
//! |-------------------------------------|-----------------------------------------|
//! | `PARTICIPANT_CLUSTER_NAME`          | `cluster_name`                          |
//! | `PARTICIPANT_INSTANCE_NAME`         | `instance_name`                         |
//! | `PARTICIPANT_COORDINATION_ADDRESS`  | `coordination_address`                  |
//! | `PARTICIPANT_CALLBACK_TIMEOUT_MS`   | `messaging.default_callback_timeout_ms` |
//! | `PARTICIPANT_CONTAINER_KIND`        | `container.required_kind`               |
//! | `PARTICIPANT_RUN_COMMAND`           | `container.run_command`                 |
//! | `PARTICIPANT_CONTAINER_COMMAND`     | `container.command`                     |
//! | `PARTICIPANT_TERMINATION`           | `container.termination`                 |
//! | `PARTICIPANT_BUFFER_SIZE`           | `container.buffer_size`                 |

use crate::container::{TerminationPolicy, DEFAULT_CONTAINER_KIND, DEFAULT_RUN_COMMAND};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "PARTICIPANT_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub cluster_name: String,
    pub instance_name: String,
    #[serde(default = "default_coordination_address")]
    pub coordination_address: String,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub container: ContainerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Applied to callbacks registered without their own timeout. `None` disables it.
    pub default_callback_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub required_kind: String,
    pub run_command: String,
    pub command: String,
    pub termination: TerminationPolicy,
    pub buffer_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            required_kind: DEFAULT_CONTAINER_KIND.to_string(),
            run_command: DEFAULT_RUN_COMMAND.to_string(),
            command: String::new(),
            termination: TerminationPolicy::default(),
            buffer_size: 32,
        }
    }
}

fn default_coordination_address() -> String {
    "localhost:2181".to_string()
}

impl ParticipantConfig {
    pub fn new(cluster_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            instance_name: instance_name.into(),
            coordination_address: default_coordination_address(),
            messaging: MessagingConfig::default(),
            container: ContainerConfig::default(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Applies `PARTICIPANT_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// Applies `PARTICIPANT_*` overrides from `vars`, ignoring every other key.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match name {
                "CLUSTER_NAME" => self.cluster_name = value,
                "INSTANCE_NAME" => self.instance_name = value,
                "COORDINATION_ADDRESS" => self.coordination_address = value,
                "CALLBACK_TIMEOUT_MS" => {
                    self.messaging.default_callback_timeout_ms =
                        Some(parse_number("messaging.default_callback_timeout_ms", &value)?);
                }
                "CONTAINER_KIND" => self.container.required_kind = value,
                "RUN_COMMAND" => self.container.run_command = value,
                "CONTAINER_COMMAND" => self.container.command = value,
                "TERMINATION" => {
                    self.container.termination =
                        serde_yaml::from_str(&value).map_err(|e| ConfigError::Invalid {
                            field: "container.termination",
                            reason: e.to_string(),
                        })?;
                }
                "BUFFER_SIZE" => {
                    self.container.buffer_size = parse_number("container.buffer_size", &value)?;
                }
                _ => continue,
            }
            debug!(variable = key.as_ref(), "Applied configuration override");
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("cluster_name", &self.cluster_name),
            ("instance_name", &self.instance_name),
            ("container.required_kind", &self.container.required_kind),
            ("container.run_command", &self.container.run_command),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.container.buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "container.buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.messaging.default_callback_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "messaging.default_callback_timeout_ms",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn default_callback_timeout(&self) -> Option<Duration> {
        self.messaging
            .default_callback_timeout_ms
            .map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: format!("'{value}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
cluster_name: riemann-cluster
instance_name: localhost_12918
coordination_address: zk-1:2181
messaging:
  default_callback_timeout_ms: 1500
container:
  required_kind: worker
  run_command: /bin/bash
  command: ./start.sh
  termination: forceful
  buffer_size: 4
"#;

    #[test]
    fn test_full_yaml() {
        let config = ParticipantConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.cluster_name, "riemann-cluster");
        assert_eq!(config.coordination_address, "zk-1:2181");
        assert_eq!(config.default_callback_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.container.required_kind, "worker");
        assert_eq!(config.container.termination, TerminationPolicy::Forceful);
        assert_eq!(config.container.buffer_size, 4);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config =
            ParticipantConfig::from_yaml_str("cluster_name: c\ninstance_name: i\n").unwrap();
        assert_eq!(config, ParticipantConfig::new("c", "i"));
        assert_eq!(config.container.run_command, "/bin/sh");
        assert_eq!(config.container.required_kind, "container");
        assert_eq!(config.container.termination, TerminationPolicy::Graceful);
        assert_eq!(config.default_callback_timeout(), None);
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let err = ParticipantConfig::from_yaml_str("instance_name: i\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides_apply_and_ignore_foreign_keys() {
        let config = ParticipantConfig::new("c", "i")
            .with_overrides([
                ("PARTICIPANT_CLUSTER_NAME", "other"),
                ("PARTICIPANT_CALLBACK_TIMEOUT_MS", "250"),
                ("PARTICIPANT_TERMINATION", "forceful"),
                ("PARTICIPANT_BUFFER_SIZE", "16"),
                ("PARTICIPANT_UNKNOWN", "x"),
                ("HOME", "/root"),
            ])
            .unwrap();
        assert_eq!(config.cluster_name, "other");
        assert_eq!(config.default_callback_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.container.termination, TerminationPolicy::Forceful);
        assert_eq!(config.container.buffer_size, 16);
    }

    #[test]
    fn test_bad_override_is_invalid() {
        let err = ParticipantConfig::new("c", "i")
            .with_overrides([("PARTICIPANT_BUFFER_SIZE", "many")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "container.buffer_size", .. }));

        let err = ParticipantConfig::new("c", "i")
            .with_overrides([("PARTICIPANT_TERMINATION", "politely")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "container.termination", .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = ParticipantConfig::new("c", "i");
        config.container.buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "container.buffer_size", .. })
        ));

        let err = ParticipantConfig::from_yaml_str("cluster_name: ' '\ninstance_name: i\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "cluster_name", .. }));

        let err = ParticipantConfig::from_yaml_str(
            "cluster_name: c\ninstance_name: i\nmessaging:\n  default_callback_timeout_ms: 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ParticipantConfig::from_file("/nonexistent/participant.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
