//! Watch-party tuning configuration

use std::time::Duration;

use crate::{parse_env, ConfigError, ConfigResult};

/// Hard upper bound for the public party listing
pub const MAX_PUBLIC_LIST_LIMIT: usize = 100;

/// Tuning knobs for watch-party sessions
#[derive(Debug, Clone, PartialEq)]
pub struct PartyConfig {
    /// Drift (in seconds) tolerated before a member is resynced
    pub sync_threshold_secs: f64,

    /// Maximum number of chat/system entries kept per party
    pub max_chat_history: usize,

    /// Number of log entries replayed to a member when they join
    pub chat_replay: usize,

    /// Maximum chat body length, in characters
    pub max_message_length: usize,

    /// Minimum gap between two resync directives to the same member
    pub resync_cooldown: Duration,

    /// Send an error frame to non-hosts issuing host-only commands
    pub notify_rejected_commands: bool,

    /// Default number of parties returned by the public listing
    pub public_list_limit: usize,
}

impl PartyConfig {
    /// Load party configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            sync_threshold_secs: parse_env("PARTY_SYNC_THRESHOLD_SECS", 2.0)?,
            max_chat_history: parse_env("PARTY_MAX_CHAT_HISTORY", 100)?,
            chat_replay: parse_env("PARTY_CHAT_REPLAY", 20)?,
            max_message_length: parse_env("PARTY_MAX_MESSAGE_LENGTH", 500)?,
            resync_cooldown: Duration::from_millis(parse_env("PARTY_RESYNC_COOLDOWN_MS", 0)?),
            notify_rejected_commands: parse_env("PARTY_NOTIFY_REJECTED", false)?,
            public_list_limit: parse_env("PARTY_PUBLIC_LIST_LIMIT", 20)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable together
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.sync_threshold_secs.is_finite() || self.sync_threshold_secs <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "PARTY_SYNC_THRESHOLD_SECS must be a positive number (got {})",
                self.sync_threshold_secs
            )));
        }
        if self.max_chat_history == 0 {
            return Err(ConfigError::ValidationError(
                "PARTY_MAX_CHAT_HISTORY must be at least 1".to_string(),
            ));
        }
        if self.chat_replay > self.max_chat_history {
            return Err(ConfigError::ValidationError(format!(
                "PARTY_CHAT_REPLAY ({}) cannot exceed PARTY_MAX_CHAT_HISTORY ({})",
                self.chat_replay, self.max_chat_history
            )));
        }
        if self.max_message_length == 0 {
            return Err(ConfigError::ValidationError(
                "PARTY_MAX_MESSAGE_LENGTH must be at least 1".to_string(),
            ));
        }
        if self.public_list_limit == 0 || self.public_list_limit > MAX_PUBLIC_LIST_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "PARTY_PUBLIC_LIST_LIMIT must be between 1 and {}",
                MAX_PUBLIC_LIST_LIMIT
            )));
        }
        Ok(())
    }
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            sync_threshold_secs: 2.0,
            max_chat_history: 100,
            chat_replay: 20,
            max_message_length: 500,
            resync_cooldown: Duration::ZERO,
            notify_rejected_commands: false,
            public_list_limit: 20,
        }
    }
}
