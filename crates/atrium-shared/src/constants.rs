//! Shared constants.

/// Text a message body is replaced with after delete-for-everyone.
pub const TOMBSTONE_TEXT: &str = "This message was deleted";

/// Default window (seconds) during which a sender may edit a message.
pub const DEFAULT_EDIT_WINDOW_SECS: u64 = 15 * 60;

/// Default delay (milliseconds) before a sent message is marked delivered.
/// Stand-in for a transport-level delivery acknowledgment.
pub const DEFAULT_DELIVERED_DELAY_MS: u64 = 800;

/// Actor id of the synthetic system sender.
pub const SYSTEM_ACTOR_ID: &str = "system";

/// Display name of the synthetic system sender.
pub const SYSTEM_ACTOR_NAME: &str = "Atrium";
