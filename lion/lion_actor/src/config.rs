//! Actor configuration.
//!
//! Groups the mailbox and supervisor settings of an actor and loads them from
//! TOML or JSON.

use crate::mailbox::MailboxConfig;
use crate::supervision::SupervisorConfig;
use lion_core::error::ConfigError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration of one actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Mailbox settings
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Supervision settings for the actor's children
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl ActorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. Files ending in `.json` are parsed as
    /// JSON, everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading actor configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        debug!(
            "Loaded {:?} mailbox with {:?} supervision",
            config.mailbox.kind, config.supervisor.strategy
        );
        Ok(config)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mailbox.validate()?;
        self.supervisor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxKind;
    use crate::supervision::StrategyKind;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ActorConfig::from_toml_str("").unwrap(), ActorConfig::default());
        assert_eq!(ActorConfig::from_json_str("{}").unwrap(), ActorConfig::default());
    }

    #[test]
    fn test_from_toml() {
        let config = ActorConfig::from_toml_str(
            r#"
            [mailbox]
            kind = "priority"

            [supervisor]
            strategy = "all_for_one"
            max_restarts = 3
            within_time_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.mailbox.kind, MailboxKind::Priority);
        assert_eq!(config.supervisor.strategy, StrategyKind::AllForOne);
        assert_eq!(config.supervisor.max_restarts, 3);
        assert_eq!(config.supervisor.max_restarts_per_minute, 10);
    }

    #[test]
    fn test_from_json() {
        let config = ActorConfig::from_json_str(
            r#"{"supervisor": {"strategy": "exponential_backoff", "min_backoff_ms": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.supervisor.strategy, StrategyKind::ExponentialBackoff);
        assert_eq!(config.supervisor.min_backoff_ms, 10);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = ActorConfig::from_toml_str(
            r#"
            [supervisor]
            strategy = "restart_with_limit"
            max_restarts_per_minute = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ActorConfig::from_json_str(r#"{"mailbox": {"kind": "mystery"}}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
