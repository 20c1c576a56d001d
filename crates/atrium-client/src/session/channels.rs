//! Channel management commands.

use atrium_shared::types::{ActorId, ChannelId, WorkspaceId};
use atrium_shared::{CoreError, Result};
use atrium_store::models::{Channel, ChannelKind, ChannelRole};
use atrium_store::{gate, ChannelPatch};
use tracing::info;

use super::Session;

impl Session {
    /// Create a channel in a workspace.  Staff only; for private channels
    /// the creator becomes channel admin.
    pub fn create_channel(
        &self,
        workspace_id: WorkspaceId,
        name: &str,
        kind: ChannelKind,
        private: bool,
        initial_members: &[ActorId],
    ) -> Result<Channel> {
        if !gate::can_manage(&self.actor) {
            return Err(CoreError::Permission(
                "actor may not create channels".into(),
            ));
        }
        let mut state = self.lock();
        state
            .channels
            .create_channel(
                workspace_id,
                name,
                kind,
                private,
                &self.actor.id,
                initial_members,
            )
            .map(Channel::clone)
    }

    /// Rename, re-describe or re-flag a channel.  Permission checks live in
    /// the registry (system channels are admin-only, custom channels allow
    /// channel admins).
    pub fn update_channel(&self, id: ChannelId, patch: ChannelPatch) -> Result<Channel> {
        let mut state = self.lock();
        state
            .channels
            .update_channel(id, patch, &self.actor)
            .map(Channel::clone)
    }

    /// Archive a channel; its history is retained.
    pub fn archive_channel(&self, id: ChannelId) -> Result<()> {
        if !gate::can_manage(&self.actor) {
            return Err(CoreError::Permission(
                "actor may not archive channels".into(),
            ));
        }
        let mut state = self.lock();
        state.channels.archive_channel(id)?;
        if self.active_channel() == Some(id) {
            self.adapter.detach(id);
        }
        Ok(())
    }

    /// Hard-delete a custom channel with its messages and overlay state.
    pub fn delete_channel(&self, id: ChannelId) -> Result<()> {
        {
            let mut state = self.lock();
            let removed = state.channels.delete_channel(id, &self.actor)?;
            let purged = state.messages.purge_channel(removed.id);
            state.overlays.purge_messages(&purged);
            info!(channel = %id, messages = purged.len(), "Channel purged");
        }
        self.adapter.detach(id);
        Ok(())
    }

    /// Add an actor to a channel's member list.  Idempotent.
    pub fn add_member(&self, id: ChannelId, actor: ActorId, role: ChannelRole) -> Result<()> {
        self.require_channel_manage(id)?;
        self.lock().channels.add_member(id, actor, role)
    }

    /// Remove an actor from a channel.  The last channel admin cannot be
    /// removed; reassign first.
    pub fn remove_member(&self, id: ChannelId, actor: &ActorId) -> Result<()> {
        self.require_channel_manage(id)?;
        self.lock().channels.remove_member(id, actor)
    }

    /// Change a member's channel role.
    pub fn set_member_role(&self, id: ChannelId, actor: &ActorId, role: ChannelRole) -> Result<()> {
        self.require_channel_manage(id)?;
        self.lock().channels.set_member_role(id, actor, role)
    }

    /// Mute or unmute this session's actor in a channel.
    pub fn set_muted(&self, id: ChannelId, muted: bool) -> Result<()> {
        self.lock().channels.set_muted(id, &self.actor.id, muted)
    }

    /// Fetch this actor's channel memberships for a workspace from the
    /// identity provider and fold them into the registry.  Unlocks private
    /// channels the actor belongs to; returns how many memberships applied.
    pub async fn sync_memberships(&self, workspace_id: WorkspaceId) -> Result<usize> {
        let member_of = self
            .identity
            .member_channels(workspace_id, &self.actor.id)
            .await?;
        let mut state = self.lock();
        let mut applied = 0;
        for id in member_of {
            // Channels outside the loaded registry are skipped, not errors.
            if state.channels.get(id).is_ok() {
                state
                    .channels
                    .add_member(id, self.actor.id.clone(), ChannelRole::Member)?;
                applied += 1;
            }
        }
        info!(workspace = %workspace_id, applied, "Memberships synced");
        Ok(applied)
    }

    /// Non-archived channels of a workspace this actor may see.
    pub fn list_channels(&self, workspace_id: WorkspaceId) -> Vec<Channel> {
        self.lock()
            .channels
            .channels_for(workspace_id, &self.actor)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Workspace staff or the channel's own admin may manage membership.
    fn require_channel_manage(&self, id: ChannelId) -> Result<()> {
        let state = self.lock();
        let channel = state.channels.get(id)?;
        let channel_admin =
            channel.membership(&self.actor.id).map(|m| m.role) == Some(ChannelRole::Admin);
        if gate::can_manage(&self.actor) || channel_admin {
            Ok(())
        } else {
            Err(CoreError::Permission(format!(
                "actor may not manage members of channel {id}"
            )))
        }
    }
}
