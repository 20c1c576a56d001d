//! Per-channel ordered message lists with optimistic insert and
//! server-confirmed reconciliation.
//!
//! Every message lives in exactly one append-only channel list.  A position
//! index gives O(1) lookup by id, and an explicit temp-id → canonical-id
//! alias table lets the reconciliation path recognise the sender's own echo
//! after the optimistic id has been replaced.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use atrium_shared::constants::{DEFAULT_EDIT_WINDOW_SECS, TOMBSTONE_TEXT};
use atrium_shared::protocol::{FileAttachment, ForwardRef, MessageRecord, ReplyRef};
use atrium_shared::tags::SystemTag;
use atrium_shared::types::{ActorSnapshot, ChannelId, MessageId};
use atrium_shared::{CoreError, Result};

use crate::models::{DeliveryStatus, Message};

/// Externally-configured moderation policy for edits and deletes.
#[derive(Debug, Clone)]
pub struct EditPolicy {
    /// How long after creation the sender may still edit.
    pub window: Duration,
    /// Whether admins/managers may edit other actors' messages.
    pub moderators_may_edit: bool,
    /// Whether admins/managers may delete other actors' messages.
    pub moderators_may_delete: bool,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_EDIT_WINDOW_SECS as i64),
            moderators_may_edit: false,
            moderators_may_delete: true,
        }
    }
}

/// In-memory message state for all loaded channels.
#[derive(Debug, Default)]
pub struct MessageStore {
    by_channel: HashMap<ChannelId, Vec<Message>>,
    /// message id → (channel, position).  Lists are append-only, so
    /// positions stay valid; the rare removal path repairs them.
    index: HashMap<MessageId, (ChannelId, usize)>,
    /// temp id → canonical server id, recorded on confirmation.
    aliases: HashMap<MessageId, MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Resolve an id (temp or canonical) to its slot.
    fn slot(&self, id: &MessageId) -> Option<(ChannelId, usize)> {
        self.index.get(id).copied().or_else(|| {
            self.aliases
                .get(id)
                .and_then(|canonical| self.index.get(canonical))
                .copied()
        })
    }

    pub fn get(&self, id: &MessageId) -> Result<&Message> {
        let (channel, pos) = self
            .slot(id)
            .ok_or_else(|| CoreError::NotFound(format!("message {id}")))?;
        Ok(&self.by_channel[&channel][pos])
    }

    pub(crate) fn get_mut(&mut self, id: &MessageId) -> Result<&mut Message> {
        let (channel, pos) = self
            .slot(id)
            .ok_or_else(|| CoreError::NotFound(format!("message {id}")))?;
        Ok(self
            .by_channel
            .get_mut(&channel)
            .expect("indexed channel exists")
            .get_mut(pos)
            .expect("indexed position exists"))
    }

    /// All messages of a channel in list order.
    pub fn channel_messages(&self, channel: ChannelId) -> &[Message] {
        self.by_channel.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pinned messages of a channel in original timestamp order.
    pub fn pinned_messages(&self, channel: ChannelId) -> Vec<&Message> {
        let mut pinned: Vec<&Message> = self
            .channel_messages(channel)
            .iter()
            .filter(|m| m.pinned)
            .collect();
        pinned.sort_by_key(|m| m.created_at);
        pinned
    }

    // ------------------------------------------------------------------
    // Optimistic send path
    // ------------------------------------------------------------------

    /// Append an optimistic message in `Sending` state and return a copy.
    /// Synchronous; never touches the network.
    pub fn send_optimistic(
        &mut self,
        channel_id: ChannelId,
        sender: ActorSnapshot,
        content: &str,
        reply: Option<ReplyRef>,
        attachments: Vec<FileAttachment>,
    ) -> Result<Message> {
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(CoreError::Validation("message content is empty".into()));
        }
        let mut message = Message::optimistic(channel_id, sender, content.to_string());
        message.reply = reply;
        message.attachments = attachments;
        Ok(self.push(message))
    }

    /// Append an optimistic system message carrying a structured tag.
    pub fn append_system(
        &mut self,
        channel_id: ChannelId,
        content: &str,
        tag: Option<SystemTag>,
    ) -> Message {
        let mut message =
            Message::optimistic(channel_id, ActorSnapshot::system(), content.to_string());
        message.is_system = true;
        message.tag = tag;
        self.push(message)
    }

    fn push(&mut self, message: Message) -> Message {
        let list = self.by_channel.entry(message.channel_id).or_default();
        self.index
            .insert(message.id.clone(), (message.channel_id, list.len()));
        list.push(message.clone());
        message
    }

    /// Replace the temp id with the server-assigned id in place (same slot)
    /// and advance to `Sent`.
    ///
    /// If the server echo already arrived through the feed before this
    /// confirmation, the optimistic duplicate is dropped instead.
    pub fn confirm_send(&mut self, temp_id: &MessageId, server_id: MessageId) -> Result<()> {
        let (channel, pos) = self
            .index
            .get(temp_id)
            .copied()
            .ok_or_else(|| CoreError::NotFound(format!("pending message {temp_id}")))?;

        if self.index.contains_key(&server_id) {
            debug!(temp = %temp_id, server = %server_id, "Echo arrived first; dropping optimistic copy");
            self.remove_at(channel, pos);
            self.aliases.insert(temp_id.clone(), server_id);
            return Ok(());
        }

        let message = &mut self
            .by_channel
            .get_mut(&channel)
            .expect("indexed channel exists")[pos];
        if !message.status.can_advance_to(DeliveryStatus::Sent) {
            return Err(CoreError::Invariant(format!(
                "message {temp_id} is not awaiting confirmation"
            )));
        }
        message.id = server_id.clone();
        message.status = DeliveryStatus::Sent;

        self.index.remove(temp_id);
        self.index.insert(server_id.clone(), (channel, pos));
        self.aliases.insert(temp_id.clone(), server_id);
        Ok(())
    }

    /// Mark a sent message delivered.  Ignored when the state machine does
    /// not allow the transition (e.g. the send failed in the meantime).
    pub fn mark_delivered(&mut self, id: &MessageId) -> Result<()> {
        let message = self.get_mut(id)?;
        if message.status.can_advance_to(DeliveryStatus::Delivered) {
            message.status = DeliveryStatus::Delivered;
        }
        Ok(())
    }

    /// Mark a delivered message read.  Same forward-only semantics.
    pub fn mark_read(&mut self, id: &MessageId) -> Result<()> {
        let message = self.get_mut(id)?;
        if message.status.can_advance_to(DeliveryStatus::Read) {
            message.status = DeliveryStatus::Read;
        }
        Ok(())
    }

    /// Transition a pending send to `Failed`, keeping it visible and
    /// retryable.
    pub fn fail_send(&mut self, temp_id: &MessageId, reason: &str) -> Result<()> {
        let message = self.get_mut(temp_id)?;
        if !message.status.can_advance_to(DeliveryStatus::Failed) {
            return Err(CoreError::Invariant(format!(
                "message {temp_id} is not awaiting confirmation"
            )));
        }
        message.status = DeliveryStatus::Failed;
        message.failure_reason = Some(reason.to_string());
        warn!(msg_id = %temp_id, reason, "Send failed");
        Ok(())
    }

    /// Restart a failed send under a fresh temp id, preserving content,
    /// reply reference and attachments.  Returns a copy for re-sending.
    pub fn begin_retry(&mut self, id: &MessageId) -> Result<Message> {
        let (channel, pos) = self
            .slot(id)
            .ok_or_else(|| CoreError::NotFound(format!("message {id}")))?;
        let message = &mut self
            .by_channel
            .get_mut(&channel)
            .expect("indexed channel exists")[pos];
        if !message.status.can_advance_to(DeliveryStatus::Sending) {
            return Err(CoreError::Invariant(format!(
                "message {id} is not in a failed state"
            )));
        }
        let old_id = message.id.clone();
        message.id = MessageId::local();
        message.status = DeliveryStatus::Sending;
        message.failure_reason = None;
        let copy = message.clone();

        self.index.remove(&old_id);
        self.index.insert(copy.id.clone(), (channel, pos));
        Ok(copy)
    }

    // ------------------------------------------------------------------
    // Reconciliation (feed path)
    // ------------------------------------------------------------------

    /// Fold a server-confirmed record into the channel list.
    ///
    /// No-op when the id is already present, directly or through the alias
    /// table — this is what suppresses the sender's own optimistic echo.
    /// Returns the appended message otherwise, in server order.
    pub fn reconcile_incoming(&mut self, record: MessageRecord) -> Option<Message> {
        if self.slot(&record.id).is_some() {
            debug!(msg_id = %record.id, "Reconcile no-op: id already present");
            return None;
        }
        Some(self.push(Message::from_record(record)))
    }

    // ------------------------------------------------------------------
    // Edit / delete / pin
    // ------------------------------------------------------------------

    /// Edit a message's content, policy-checked.
    ///
    /// The sender may edit within the policy window; moderators may edit
    /// others' messages only when the policy allows it.  Tombstones are
    /// immutable.
    pub fn edit(
        &mut self,
        id: &MessageId,
        new_content: &str,
        actor: &ActorSnapshot,
        policy: &EditPolicy,
    ) -> Result<()> {
        if new_content.trim().is_empty() {
            return Err(CoreError::Validation("edited content is empty".into()));
        }
        let window = policy.window;
        let moderators_may_edit = policy.moderators_may_edit;
        let message = self.get_mut(id)?;
        if message.deleted_for_everyone {
            return Err(CoreError::Invariant(
                "deleted messages are immutable".into(),
            ));
        }
        let is_sender = message.sender.id == actor.id;
        let is_moderator = moderators_may_edit && actor.role.can_manage();
        if !is_sender && !is_moderator {
            return Err(CoreError::Permission(
                "only the sender may edit this message".into(),
            ));
        }
        if is_sender && !is_moderator && Utc::now() - message.created_at > window {
            return Err(CoreError::Permission("edit window has elapsed".into()));
        }
        message.content = new_content.to_string();
        message.edited = true;
        Ok(())
    }

    /// Apply an authoritative edit from the change feed.  No policy checks;
    /// tombstones still win.
    pub fn apply_remote_edit(&mut self, id: &MessageId, content: &str) -> Result<()> {
        let message = self.get_mut(id)?;
        if message.deleted_for_everyone {
            return Ok(());
        }
        message.content = content.to_string();
        message.edited = true;
        Ok(())
    }

    /// Delete for everyone: replace the content with the tombstone marker.
    /// Irreversible; idempotent.  Per-actor hides are an overlay concern and
    /// never reach this store.
    pub fn delete_for_everyone(
        &mut self,
        id: &MessageId,
        actor: &ActorSnapshot,
        policy: &EditPolicy,
    ) -> Result<()> {
        let moderators_may_delete = policy.moderators_may_delete;
        let message = self.get_mut(id)?;
        if message.deleted_for_everyone {
            return Ok(());
        }
        let is_sender = message.sender.id == actor.id;
        let is_moderator = moderators_may_delete && actor.role.can_manage();
        if !is_sender && !is_moderator {
            return Err(CoreError::Permission(
                "only the sender may delete this message".into(),
            ));
        }
        Self::tombstone(message);
        Ok(())
    }

    /// Apply an authoritative delete from the change feed.
    pub fn apply_remote_delete(&mut self, id: &MessageId, for_everyone: bool) -> Result<()> {
        if !for_everyone {
            // Per-actor hides are never replicated.
            return Ok(());
        }
        let message = self.get_mut(id)?;
        if !message.deleted_for_everyone {
            Self::tombstone(message);
        }
        Ok(())
    }

    fn tombstone(message: &mut Message) {
        message.content = TOMBSTONE_TEXT.to_string();
        message.deleted_for_everyone = true;
        message.attachments.clear();
        message.reactions.clear();
        message.pinned = false;
    }

    /// Pin a message.  Tombstones cannot be pinned.
    pub fn pin(&mut self, id: &MessageId) -> Result<()> {
        let message = self.get_mut(id)?;
        if message.deleted_for_everyone {
            return Err(CoreError::Invariant(
                "deleted messages cannot be pinned".into(),
            ));
        }
        message.pinned = true;
        Ok(())
    }

    pub fn unpin(&mut self, id: &MessageId) -> Result<()> {
        let message = self.get_mut(id)?;
        message.pinned = false;
        Ok(())
    }

    /// Apply an authoritative pin state from the change feed.
    pub fn apply_remote_pin(&mut self, id: &MessageId, pinned: bool) -> Result<()> {
        let message = self.get_mut(id)?;
        if !message.deleted_for_everyone {
            message.pinned = pinned;
        }
        Ok(())
    }

    /// Overwrite a message with a previously-taken snapshot.
    ///
    /// Session rollback path: an optimistic edit/delete/pin was rejected by
    /// the transport and the pre-mutation snapshot is restored so local
    /// state never diverges from the server.
    pub fn restore(&mut self, snapshot: Message) -> Result<()> {
        let slot = self.get_mut(&snapshot.id)?;
        *slot = snapshot;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Forwarding
    // ------------------------------------------------------------------

    /// Create a copy of a message in another channel carrying a reference
    /// back to the original.  The original is untouched.
    pub fn forward(
        &mut self,
        id: &MessageId,
        target_channel: ChannelId,
        forwarder: ActorSnapshot,
        source_channel_name: &str,
    ) -> Result<Message> {
        let original = self.get(id)?;
        if original.deleted_for_everyone {
            return Err(CoreError::Invariant(
                "deleted messages cannot be forwarded".into(),
            ));
        }
        let forward_ref = ForwardRef {
            source_channel_name: source_channel_name.to_string(),
            original_sender: original.sender.name.clone(),
            original_content: original.content.clone(),
        };
        let content = original.content.clone();
        let attachments = original.attachments.clone();

        let mut copy = Message::optimistic(target_channel, forwarder, content);
        copy.forwarded_from = Some(forward_ref);
        copy.attachments = attachments;
        Ok(self.push(copy))
    }

    // ------------------------------------------------------------------
    // Purge
    // ------------------------------------------------------------------

    /// Remove every message of a channel (admin cascade on channel delete).
    /// Returns the ids that were removed so overlays can be purged too.
    pub fn purge_channel(&mut self, channel: ChannelId) -> Vec<MessageId> {
        let Some(list) = self.by_channel.remove(&channel) else {
            return Vec::new();
        };
        let ids: Vec<MessageId> = list.into_iter().map(|m| m.id).collect();
        for id in &ids {
            self.index.remove(id);
        }
        self.aliases.retain(|_, canonical| !ids.contains(canonical));
        ids
    }

    /// Remove one message and repair the position index of its channel.
    fn remove_at(&mut self, channel: ChannelId, pos: usize) {
        let list = self.by_channel.get_mut(&channel).expect("channel exists");
        let removed = list.remove(pos);
        self.index.remove(&removed.id);
        for (i, message) in list.iter().enumerate().skip(pos) {
            self.index.insert(message.id.clone(), (channel, i));
        }
    }
}
