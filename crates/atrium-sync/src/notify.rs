//! Notifications sent from the background tasks to the application.
//!
//! Counterpart of the feed direction: the store mutates synchronously, and
//! anything a UI needs to hear about after the fact arrives here.

use atrium_shared::types::{ChannelId, MessageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreNotification {
    /// An optimistic send was confirmed under its canonical id.
    MessageConfirmed {
        temp_id: MessageId,
        id: MessageId,
    },
    /// A sent message was acknowledged as delivered.
    MessageDelivered {
        id: MessageId,
    },
    /// A send failed; the message is visible in `failed` state and
    /// retryable.
    SendFailed {
        id: MessageId,
        reason: String,
    },
    /// A remote edit/delete/pin was rejected; the optimistic local change
    /// has been reverted.
    RemoteRejected {
        op: &'static str,
        id: MessageId,
        error: String,
    },
    /// A downstream business call (campaign, deliverable, wallet) failed.
    /// The chat announcement stays; the action needs operator follow-up.
    SystemActionFailed {
        action: &'static str,
        error: String,
    },
    /// A channel's unread counter changed from feed activity.
    UnreadChanged {
        channel_id: ChannelId,
        unread: u32,
    },
}
