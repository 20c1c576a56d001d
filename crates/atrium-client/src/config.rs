//! Session configuration loaded from environment variables.
//!
//! All settings have sensible defaults so a session can start with zero
//! configuration in development.

use std::collections::HashMap;
use std::time::Duration;

use atrium_shared::constants::{DEFAULT_DELIVERED_DELAY_MS, DEFAULT_EDIT_WINDOW_SECS};
use atrium_store::EditPolicy;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long after creation the sender may edit a message.
    /// Env: `ATRIUM_EDIT_WINDOW_SECS`
    /// Default: `900`
    pub edit_window_secs: u64,

    /// Delay before a confirmed send is marked delivered (ack stand-in).
    /// Env: `ATRIUM_DELIVERED_DELAY_MS`
    /// Default: `800`
    pub delivered_delay_ms: u64,

    /// Whether admins/managers may edit other actors' messages.
    /// Env: `ATRIUM_MODERATORS_MAY_EDIT` (true/false)
    /// Default: `false`
    pub moderators_may_edit: bool,

    /// Whether admins/managers may delete other actors' messages.
    /// Env: `ATRIUM_MODERATORS_MAY_DELETE` (true/false)
    /// Default: `true`
    pub moderators_may_delete: bool,

    /// Maximum accepted attachment size in bytes (25 MiB).
    /// Env: `ATRIUM_MAX_ATTACHMENT_BYTES`
    pub max_attachment_bytes: usize,

    /// Price per deliverable kind in whole currency units; kinds without a
    /// price produce no wallet debit.  Configured in code by the host.
    pub deliverable_price: HashMap<String, u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            edit_window_secs: DEFAULT_EDIT_WINDOW_SECS,
            delivered_delay_ms: DEFAULT_DELIVERED_DELAY_MS,
            moderators_may_edit: false,
            moderators_may_delete: true,
            max_attachment_bytes: 25 * 1024 * 1024, // 25 MiB
            deliverable_price: HashMap::new(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ATRIUM_EDIT_WINDOW_SECS") {
            match v.parse() {
                Ok(secs) => config.edit_window_secs = secs,
                Err(_) => tracing::warn!(value = %v, "Invalid ATRIUM_EDIT_WINDOW_SECS, using default"),
            }
        }

        if let Ok(v) = std::env::var("ATRIUM_DELIVERED_DELAY_MS") {
            match v.parse() {
                Ok(ms) => config.delivered_delay_ms = ms,
                Err(_) => tracing::warn!(value = %v, "Invalid ATRIUM_DELIVERED_DELAY_MS, using default"),
            }
        }

        if let Ok(v) = std::env::var("ATRIUM_MODERATORS_MAY_EDIT") {
            config.moderators_may_edit = v == "true" || v == "1";
        }

        if let Ok(v) = std::env::var("ATRIUM_MODERATORS_MAY_DELETE") {
            config.moderators_may_delete = v == "true" || v == "1";
        }

        if let Ok(v) = std::env::var("ATRIUM_MAX_ATTACHMENT_BYTES") {
            match v.parse() {
                Ok(bytes) => config.max_attachment_bytes = bytes,
                Err(_) => {
                    tracing::warn!(value = %v, "Invalid ATRIUM_MAX_ATTACHMENT_BYTES, using default")
                }
            }
        }

        config
    }

    /// Moderation policy handed to the message store.
    pub fn edit_policy(&self) -> EditPolicy {
        EditPolicy {
            window: chrono::Duration::seconds(self.edit_window_secs as i64),
            moderators_may_edit: self.moderators_may_edit,
            moderators_may_delete: self.moderators_may_delete,
        }
    }

    pub fn delivered_delay(&self) -> Duration {
        Duration::from_millis(self.delivered_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SessionConfig::default();
        assert_eq!(config.edit_window_secs, 900);
        assert!(!config.moderators_may_edit);
        assert!(config.moderators_may_delete);
        assert_eq!(config.delivered_delay(), Duration::from_millis(800));
    }

    #[test]
    fn policy_reflects_config() {
        let config = SessionConfig {
            edit_window_secs: 60,
            moderators_may_edit: true,
            ..Default::default()
        };
        let policy = config.edit_policy();
        assert_eq!(policy.window, chrono::Duration::seconds(60));
        assert!(policy.moderators_may_edit);
    }
}
