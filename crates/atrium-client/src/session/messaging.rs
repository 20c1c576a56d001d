//! Message commands: the optimistic-then-async send/edit/react surface.

use std::sync::Arc;

use tracing::{info, warn};

use atrium_shared::protocol::{FileAttachment, MessageEnvelope, ReplyRef};
use atrium_shared::types::{ChannelId, MessageId};
use atrium_shared::{CoreError, Result};
use atrium_store::models::Message;
use atrium_store::{gate, ReactionToggle};
use atrium_sync::sender::spawn_send;
use atrium_sync::CoreNotification;

use super::Session;

impl Session {
    /// Append an optimistic message and start its send.  Returns the local
    /// `Sending` message immediately.
    pub fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        reply: Option<ReplyRef>,
        attachments: Vec<FileAttachment>,
    ) -> Result<Message> {
        let message = {
            let mut state = self.lock();
            let channel = state.channels.get(channel_id)?;
            if !gate::can_view(&self.actor, channel) {
                return Err(CoreError::Permission(format!(
                    "actor may not post in channel {channel_id}"
                )));
            }
            state.messages.send_optimistic(
                channel_id,
                self.actor.clone(),
                content,
                reply,
                attachments,
            )?
        };
        self.spawn_message_send(&message);
        Ok(message)
    }

    /// Retry a failed send under a fresh temp id, preserving content,
    /// reply reference and attachments.
    pub fn retry_send(&self, id: &MessageId) -> Result<Message> {
        let message = self.lock().messages.begin_retry(id)?;
        info!(old_id = %id, new_id = %message.id, "Retrying send");
        self.spawn_message_send(&message);
        Ok(message)
    }

    fn spawn_message_send(&self, message: &Message) {
        let envelope = MessageEnvelope {
            channel_id: message.channel_id,
            sender: message.sender.clone(),
            content: message.content.clone(),
            reply: message.reply.clone(),
            attachments: message.attachments.clone(),
            tag: message.tag.clone(),
            is_system: message.is_system,
        };
        spawn_send(
            Arc::clone(&self.state),
            Arc::clone(&self.transport),
            self.notify.clone(),
            message.id.clone(),
            envelope,
            self.config.delivered_delay(),
        );
    }

    /// Edit a message.  The local change applies immediately; a rejected
    /// remote edit restores the pre-edit snapshot and notifies.
    pub fn edit_message(&self, id: &MessageId, new_content: &str) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            let snapshot = state.messages.get(id)?.clone();
            state
                .messages
                .edit(id, new_content, &self.actor, &self.config.edit_policy())?;
            snapshot
        };
        self.spawn_revertible(
            "edit",
            snapshot,
            self.transport_call_edit(id.clone(), new_content.to_string()),
        );
        Ok(())
    }

    /// Delete a message: tombstone for everyone, or hide it from this
    /// actor's view only.
    pub fn delete_message(&self, id: &MessageId, for_everyone: bool) -> Result<()> {
        if for_everyone {
            let snapshot = {
                let mut state = self.lock();
                let snapshot = state.messages.get(id)?.clone();
                state
                    .messages
                    .delete_for_everyone(id, &self.actor, &self.config.edit_policy())?;
                snapshot
            };
            let transport = Arc::clone(&self.transport);
            let call_id = id.clone();
            self.spawn_revertible("delete", snapshot, async move {
                transport.delete_message(&call_id, true).await
            });
        } else {
            let call_id = {
                let mut state = self.lock();
                // Resolve first so hiding an unknown id is an error.
                let canonical = state.messages.get(id)?.id.clone();
                state.overlays.hide(&self.actor.id, &canonical);
                canonical
            };
            let transport = Arc::clone(&self.transport);
            let state = Arc::clone(&self.state);
            let actor = self.actor.id.clone();
            let notify = self.notify.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.delete_message(&call_id, false).await {
                    warn!(msg_id = %call_id, error = %e, "Hide rejected; reverting");
                    state
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .overlays
                        .unhide(&actor, &call_id);
                    let _ = notify
                        .send(CoreNotification::RemoteRejected {
                            op: "hide",
                            id: call_id,
                            error: e.to_string(),
                        })
                        .await;
                }
            });
        }
        Ok(())
    }

    /// Pin a message.  Reverted and reported if the server rejects it.
    pub fn pin_message(&self, id: &MessageId) -> Result<()> {
        let (snapshot, channel) = {
            let mut state = self.lock();
            let snapshot = state.messages.get(id)?.clone();
            state.messages.pin(id)?;
            let channel = snapshot.channel_id;
            (snapshot, channel)
        };
        let transport = Arc::clone(&self.transport);
        let actor = self.actor.id.clone();
        let call_id = id.clone();
        self.spawn_revertible("pin", snapshot, async move {
            transport.pin_message(&call_id, channel, &actor).await
        });
        Ok(())
    }

    /// Unpin a message.
    pub fn unpin_message(&self, id: &MessageId) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            let snapshot = state.messages.get(id)?.clone();
            state.messages.unpin(id)?;
            snapshot
        };
        let transport = Arc::clone(&self.transport);
        let call_id = id.clone();
        self.spawn_revertible("unpin", snapshot, async move {
            transport.unpin_message(&call_id).await
        });
        Ok(())
    }

    /// Toggle this actor's reaction.  A rejected remote call leaves the
    /// optimistic state in place (background reconciliation via the feed)
    /// and raises a side-channel alert.
    pub fn toggle_reaction(&self, id: &MessageId, emoji: &str) -> Result<ReactionToggle> {
        let outcome = self
            .lock()
            .messages
            .toggle_reaction(id, emoji, &self.actor.id)?;

        let transport = Arc::clone(&self.transport);
        let notify = self.notify.clone();
        let actor = self.actor.id.clone();
        let call_id = id.clone();
        let emoji = emoji.to_string();
        tokio::spawn(async move {
            let result = match outcome {
                ReactionToggle::Added => transport.add_reaction(&call_id, &emoji, &actor).await,
                ReactionToggle::Removed => {
                    transport.remove_reaction(&call_id, &emoji, &actor).await
                }
            };
            if let Err(e) = result {
                warn!(msg_id = %call_id, emoji, error = %e, "Reaction sync failed");
                let _ = notify
                    .send(CoreNotification::SystemActionFailed {
                        action: "reaction-sync",
                        error: e.to_string(),
                    })
                    .await;
            }
        });
        Ok(outcome)
    }

    /// Toggle the per-actor saved flag.  Purely local; returns the new
    /// state.
    pub fn toggle_saved(&self, id: &MessageId) -> Result<bool> {
        let mut state = self.lock();
        let canonical = state.messages.get(id)?.id.clone();
        Ok(state.overlays.toggle_saved(&self.actor.id, &canonical))
    }

    /// Copy a message into another channel, keeping a reference back to the
    /// original.
    pub fn forward_message(&self, id: &MessageId, target_channel: ChannelId) -> Result<Message> {
        let (copy, source_name) = {
            let mut state = self.lock();
            let target = state.channels.get(target_channel)?;
            if !gate::can_view(&self.actor, target) {
                return Err(CoreError::Permission(format!(
                    "actor may not post in channel {target_channel}"
                )));
            }
            let source_channel = state.messages.get(id)?.channel_id;
            let source_name = state
                .channels
                .get(source_channel)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            let copy = state
                .messages
                .forward(id, target_channel, self.actor.clone(), &source_name)?;
            (copy, source_name)
        };

        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let notify = self.notify.clone();
        let original_id = id.clone();
        let temp_id = copy.id.clone();
        let forwarder = self.actor.clone();
        tokio::spawn(async move {
            match transport
                .forward_message(&original_id, target_channel, &forwarder, &source_name)
                .await
            {
                Ok(server_id) => {
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    if let Err(e) = state.messages.confirm_send(&temp_id, server_id) {
                        warn!(temp = %temp_id, error = %e, "Forward confirm failed");
                    }
                }
                Err(e) => {
                    let _ = state
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .messages
                        .fail_send(&temp_id, &e.to_string());
                    let _ = notify
                        .send(CoreNotification::SendFailed {
                            id: temp_id,
                            reason: e.to_string(),
                        })
                        .await;
                }
            }
        });
        Ok(copy)
    }

    /// Upload a file through the transport, returning its attachment
    /// metadata for a subsequent [`Session::send_message`].
    pub async fn upload_attachment(
        &self,
        data: Vec<u8>,
        name: &str,
        mime_type: &str,
        channel: ChannelId,
    ) -> Result<FileAttachment> {
        if data.len() > self.config.max_attachment_bytes {
            return Err(CoreError::Validation(format!(
                "attachment exceeds {} bytes",
                self.config.max_attachment_bytes
            )));
        }
        self.transport
            .upload_file(data, name, mime_type, channel)
            .await
    }

    /// Mark a delivered message as read by this session's actor.
    pub fn mark_read(&self, id: &MessageId) -> Result<()> {
        self.lock().messages.mark_read(id)
    }

    // ------------------------------------------------------------------
    // Intake flows
    // ------------------------------------------------------------------

    /// Submit a boost: announces the system message and fires the campaign
    /// and wallet side effects.
    pub fn submit_boost(&self, event: atrium_sync::BoostSubmitted) -> Message {
        self.generator.boost_submitted(event)
    }

    /// Request a deliverable: announces the system message and fires the
    /// deliverable and wallet side effects.
    pub fn request_deliverable(&self, event: atrium_sync::DeliverableRequested) -> Message {
        self.generator.deliverable_requested(event)
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn transport_call_edit(
        &self,
        id: MessageId,
        content: String,
    ) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        async move { transport.edit_message(&id, &content).await }
    }

    /// Run a remote call; on failure restore the pre-mutation snapshot and
    /// notify.  Sends deliberately do not go through here — a failed send
    /// persists as a visible `failed` record instead of reverting.
    fn spawn_revertible(
        &self,
        op: &'static str,
        snapshot: Message,
        call: impl std::future::Future<Output = Result<()>> + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        let notify = self.notify.clone();
        tokio::spawn(async move {
            if let Err(e) = call.await {
                warn!(op, msg_id = %snapshot.id, error = %e, "Remote call rejected; reverting");
                let id = snapshot.id.clone();
                if let Err(restore_err) = state
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .messages
                    .restore(snapshot)
                {
                    warn!(op, msg_id = %id, error = %restore_err, "Revert failed");
                }
                let _ = notify
                    .send(CoreNotification::RemoteRejected {
                        op,
                        id,
                        error: e.to_string(),
                    })
                    .await;
            }
        });
    }

    /// Messages of a channel as this actor sees them, with the actor's
    /// per-actor hides filtered out.  Saved state is queried separately via
    /// [`Session::saved_messages`].
    pub fn visible_messages(&self, channel: ChannelId) -> Result<Vec<Message>> {
        let state = self.lock();
        let chan = state.channels.get(channel)?;
        if !gate::can_view(&self.actor, chan) {
            return Err(CoreError::Permission(format!(
                "actor may not view channel {channel}"
            )));
        }
        Ok(state
            .messages
            .channel_messages(channel)
            .iter()
            .filter(|m| !state.overlays.is_hidden(&self.actor.id, &m.id))
            .cloned()
            .collect())
    }

    /// Pinned messages of a channel in original timestamp order.
    pub fn pinned_messages(&self, channel: ChannelId) -> Vec<Message> {
        self.lock()
            .messages
            .pinned_messages(channel)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Messages this actor has saved, across channels.
    pub fn saved_messages(&self) -> Vec<Message> {
        let state = self.lock();
        state
            .overlays
            .saved_for(&self.actor.id)
            .into_iter()
            .filter_map(|id| state.messages.get(&id).ok().cloned())
            .collect()
    }
}
