//! Record and event shapes exchanged with the persistence and change-feed
//! services.
//!
//! `MessageRecord` is the server-authoritative message shape; `ChannelEvent`
//! is what the change feed delivers for a subscribed channel.  Both carry
//! serde derives so any transport implementation can move them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::SystemTag;
use crate::types::{ActorId, ActorSnapshot, ChannelId, MessageId};

/// Snapshot of the message being replied to, embedded in the reply so it
/// renders even if the target is later deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub sender_name: String,
    pub content: String,
}

/// Reference carried by a forwarded copy back to its original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardRef {
    pub source_channel_name: String,
    pub original_sender: String,
    pub original_content: String,
}

/// Metadata for an uploaded file attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAttachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Outbound message envelope handed to the persistence service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub channel_id: ChannelId,
    pub sender: ActorSnapshot,
    pub content: String,
    pub reply: Option<ReplyRef>,
    pub attachments: Vec<FileAttachment>,
    pub tag: Option<SystemTag>,
    pub is_system: bool,
}

/// A server-confirmed message as persisted and replicated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender: ActorSnapshot,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub reply: Option<ReplyRef>,
    pub forwarded_from: Option<ForwardRef>,
    pub attachments: Vec<FileAttachment>,
    pub tag: Option<SystemTag>,
    pub is_system: bool,
    pub edited: bool,
    pub deleted_for_everyone: bool,
    pub pinned: bool,
}

impl MessageRecord {
    /// Minimal record builder used by feed implementations and tests.
    pub fn new(
        id: impl Into<MessageId>,
        channel_id: ChannelId,
        sender: ActorSnapshot,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id,
            sender,
            content: content.into(),
            timestamp: Utc::now(),
            reply: None,
            forwarded_from: None,
            attachments: Vec::new(),
            tag: None,
            is_system: false,
            edited: false,
            deleted_for_everyone: false,
            pinned: false,
        }
    }
}

/// Change-feed events for a subscribed channel.
///
/// Update events carry the authoritative server state; they are applied to
/// the local store without policy re-validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    MessageInserted(MessageRecord),
    MessageEdited {
        id: MessageId,
        content: String,
    },
    MessageDeleted {
        id: MessageId,
        for_everyone: bool,
    },
    MessagePinned {
        id: MessageId,
        pinned: bool,
    },
    ReactionToggled {
        message_id: MessageId,
        emoji: String,
        actor_id: ActorId,
        added: bool,
    },
    MembershipChanged {
        channel_id: ChannelId,
        actor_id: ActorId,
        joined: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn feed_events_carry_a_snake_case_type_tag() {
        let event = ChannelEvent::MessageDeleted {
            id: MessageId::from("srv-1"),
            for_everyone: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_deleted");
        assert_eq!(json["for_everyone"], true);
    }

    #[test]
    fn inserted_record_survives_a_feed_round_trip() {
        let sender = ActorSnapshot {
            id: ActorId::from("alice"),
            name: "alice".into(),
            avatar: None,
            role: Role::Member,
        };
        let event =
            ChannelEvent::MessageInserted(MessageRecord::new("srv-2", ChannelId::new(), sender, "hi"));
        let json = serde_json::to_string(&event).unwrap();
        let back: ChannelEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
