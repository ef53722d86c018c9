//! Protocol limits.
//!
//! Defaults suit a desktop peer. Embedders can override them in code or via
//! environment variables with [`ProtocolConfig::from_env`].

use thiserror::Error;

/// Maximum accepted message size (50MB), guarding against hostile peers.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Default number of `(sender, session)` streams remembered for dedup.
pub const DEFAULT_MAX_TRACKED_SESSIONS: usize = 4096;

const MAX_MESSAGE_SIZE_VAR: &str = "REPO_PROTOCOL_MAX_MESSAGE_SIZE";
const MAX_TRACKED_SESSIONS_VAR: &str = "REPO_PROTOCOL_MAX_TRACKED_SESSIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Configuration for ephemeral deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// Streams remembered before the least recently active one is evicted (default: 4096)
    pub max_tracked_sessions: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_tracked_sessions: DEFAULT_MAX_TRACKED_SESSIONS,
        }
    }
}

/// Configuration for the receive pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Larger messages are dropped before parsing (default: 50MB)
    pub max_message_size: usize,
    pub dedup: DedupConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            dedup: DedupConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Load overrides from environment variables.
    ///
    /// Optional environment variables:
    /// - `REPO_PROTOCOL_MAX_MESSAGE_SIZE`: bytes
    /// - `REPO_PROTOCOL_MAX_TRACKED_SESSIONS`: dedup table size
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(MAX_MESSAGE_SIZE_VAR) {
            config.max_message_size = parse_positive(MAX_MESSAGE_SIZE_VAR, &value)?;
        }
        if let Some(value) = lookup(MAX_TRACKED_SESSIONS_VAR) {
            config.dedup.max_tracked_sessions = parse_positive(MAX_TRACKED_SESSIONS_VAR, &value)?;
        }

        Ok(config)
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.max_message_size, 50 * 1024 * 1024);
        assert_eq!(config.dedup.max_tracked_sessions, 4096);
    }

    #[test]
    fn test_no_overrides() {
        let config = ProtocolConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProtocolConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ProtocolConfig::from_lookup(lookup(&[
            ("REPO_PROTOCOL_MAX_MESSAGE_SIZE", "1024"),
            ("REPO_PROTOCOL_MAX_TRACKED_SESSIONS", " 16 "),
        ]))
        .unwrap();
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.dedup.max_tracked_sessions, 16);
    }

    #[test]
    fn test_invalid_values() {
        let err = ProtocolConfig::from_lookup(lookup(&[("REPO_PROTOCOL_MAX_MESSAGE_SIZE", "big")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "REPO_PROTOCOL_MAX_MESSAGE_SIZE",
                value: "big".into(),
            }
        );

        assert!(
            ProtocolConfig::from_lookup(lookup(&[("REPO_PROTOCOL_MAX_TRACKED_SESSIONS", "0")]))
                .is_err()
        );
    }
}
