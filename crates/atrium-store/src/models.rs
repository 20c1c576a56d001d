//! Domain model structs held in the in-memory core state.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer or snapshot for diagnostics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atrium_shared::protocol::{FileAttachment, ForwardRef, MessageRecord, ReplyRef};
use atrium_shared::tags::SystemTag;
use atrium_shared::types::{ActorId, ActorSnapshot, ChannelId, MessageId, WorkspaceId};

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Client lifecycle status shown on the workspace badge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceStatus {
    Active,
    Paused,
    AtRisk,
    Churning,
}

/// A client workspace: the top-level tenant scope containing channels.
///
/// Provisioned by an external process; this subsystem mutates badges
/// (unread, last message, health) and the pinned/archived flags only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    /// Short logo glyph (emoji or initials).
    pub glyph: String,
    pub status: WorkspaceStatus,
    /// Health score 0-100, recomputed by external analytics.
    pub health: u8,
    pub pinned: bool,
    pub unread: u32,
    /// Percentage of the client's package already consumed.
    pub package_used_pct: u8,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl Workspace {
    pub fn new(id: WorkspaceId, name: impl Into<String>, glyph: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            glyph: glyph.into(),
            status: WorkspaceStatus::Active,
            health: 100,
            pinned: false,
            unread: 0,
            package_used_pct: 0,
            last_message: None,
            last_message_at: None,
            archived: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Channel kind.  Every kind except `Custom` is a system channel created on
/// workspace provisioning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    General,
    Deliverables,
    BoostRequests,
    Billing,
    /// Staff-only coordination channel; never visible to clients.
    Internal,
    Custom,
}

impl ChannelKind {
    pub fn is_system(&self) -> bool {
        !matches!(self, ChannelKind::Custom)
    }
}

/// Role of an actor within one channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Member,
    Admin,
}

/// One actor's membership in a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMembership {
    pub actor_id: ActorId,
    pub role: ChannelRole,
    pub muted: bool,
}

/// A conversation stream within a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub kind: ChannelKind,
    /// Restricts the channel to its membership list for client roles.
    pub private: bool,
    pub description: Option<String>,
    pub unread: u32,
    /// Ordered membership list; order is join order.
    pub members: Vec<ChannelMembership>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn membership(&self, actor: &ActorId) -> Option<&ChannelMembership> {
        self.members.iter().find(|m| &m.actor_id == actor)
    }

    pub fn admin_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == ChannelRole::Admin)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Delivery lifecycle of a message.
///
/// Advances forward only (`Sending → Sent → Delivered → Read`); `Failed` is
/// reachable from `Sending` and may return to `Sending` on retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_advance_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (*self, next),
            (Sending, Sent)
                | (Sent, Delivered)
                | (Delivered, Read)
                | (Sending, Failed)
                | (Failed, Sending)
        )
    }
}

/// A single chat message in a channel's ordered list.
///
/// Reactions live inline as emoji → actor-set; the count of a reaction is
/// always the cardinality of its set, never stored separately.  Per-actor
/// saved/hidden flags do NOT live here — see [`crate::overlays`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender: ActorSnapshot,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub edited: bool,
    pub deleted_for_everyone: bool,
    pub pinned: bool,
    pub reply: Option<ReplyRef>,
    pub forwarded_from: Option<ForwardRef>,
    pub attachments: Vec<FileAttachment>,
    pub tag: Option<SystemTag>,
    pub is_system: bool,
    /// emoji → reacting actors.  BTree keeps snapshot output deterministic.
    pub reactions: BTreeMap<String, BTreeSet<ActorId>>,
    /// Reason recorded when the send failed; cleared on retry.
    pub failure_reason: Option<String>,
}

impl Message {
    /// Build an optimistic message in `Sending` state with a fresh local id.
    pub fn optimistic(channel_id: ChannelId, sender: ActorSnapshot, content: String) -> Self {
        Self {
            id: MessageId::local(),
            channel_id,
            sender,
            content,
            created_at: Utc::now(),
            status: DeliveryStatus::Sending,
            edited: false,
            deleted_for_everyone: false,
            pinned: false,
            reply: None,
            forwarded_from: None,
            attachments: Vec::new(),
            tag: None,
            is_system: false,
            reactions: BTreeMap::new(),
            failure_reason: None,
        }
    }

    /// Build a local message from a server-confirmed record.
    pub fn from_record(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            channel_id: record.channel_id,
            sender: record.sender,
            content: record.content,
            created_at: record.timestamp,
            status: DeliveryStatus::Delivered,
            edited: record.edited,
            deleted_for_everyone: record.deleted_for_everyone,
            pinned: record.pinned,
            reply: record.reply,
            forwarded_from: record.forwarded_from,
            attachments: record.attachments,
            tag: record.tag,
            is_system: record.is_system,
            reactions: BTreeMap::new(),
            failure_reason: None,
        }
    }

    /// Total number of reactions across all emoji.
    pub fn reaction_count(&self) -> usize {
        self.reactions.values().map(|set| set.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_never_regresses() {
        use DeliveryStatus::*;
        assert!(Sending.can_advance_to(Sent));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Delivered.can_advance_to(Read));
        assert!(!Sent.can_advance_to(Sending));
        assert!(!Delivered.can_advance_to(Sent));
        assert!(!Read.can_advance_to(Delivered));
    }

    #[test]
    fn failed_only_from_sending_and_retryable() {
        use DeliveryStatus::*;
        assert!(Sending.can_advance_to(Failed));
        assert!(!Sent.can_advance_to(Failed));
        assert!(!Delivered.can_advance_to(Failed));
        assert!(Failed.can_advance_to(Sending));
        assert!(!Failed.can_advance_to(Sent));
    }
}
