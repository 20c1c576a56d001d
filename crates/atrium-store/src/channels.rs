//! CRUD operations over [`Channel`] records within workspaces.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use atrium_shared::types::{ActorId, ActorSnapshot, ChannelId, WorkspaceId};
use atrium_shared::{CoreError, Result};

use crate::gate;
use crate::models::{Channel, ChannelKind, ChannelMembership, ChannelRole};

/// Partial update applied by [`ChannelRegistry::update_channel`].
#[derive(Debug, Clone, Default)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub private: Option<bool>,
}

/// Registry of channels across all loaded workspaces.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a channel in a workspace.
    ///
    /// Fails with `Validation` on an empty name or a case-insensitive name
    /// collision with a non-archived channel in the same workspace.  For
    /// private channels the creator is auto-added as channel admin and the
    /// initial members as plain members.
    pub fn create_channel(
        &mut self,
        workspace_id: WorkspaceId,
        name: &str,
        kind: ChannelKind,
        private: bool,
        creator: &ActorId,
        initial_members: &[ActorId],
    ) -> Result<&Channel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("channel name is empty".into()));
        }
        if self.name_taken(workspace_id, name) {
            return Err(CoreError::Validation(format!(
                "channel name '{name}' already exists in workspace"
            )));
        }

        let mut members = Vec::new();
        if private {
            members.push(ChannelMembership {
                actor_id: creator.clone(),
                role: ChannelRole::Admin,
                muted: false,
            });
            for actor in initial_members {
                if actor != creator {
                    members.push(ChannelMembership {
                        actor_id: actor.clone(),
                        role: ChannelRole::Member,
                        muted: false,
                    });
                }
            }
        }

        let channel = Channel {
            id: ChannelId::new(),
            workspace_id,
            name: name.to_string(),
            kind,
            private,
            description: None,
            unread: 0,
            members,
            archived: false,
            created_at: Utc::now(),
        };
        let id = channel.id;
        info!(channel = %id, workspace = %workspace_id, name, "Channel created");
        Ok(self.channels.entry(id).or_insert(channel))
    }

    // ------------------------------------------------------------------
    // Lookup / listing
    // ------------------------------------------------------------------

    pub fn get(&self, id: ChannelId) -> Result<&Channel> {
        self.channels
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("channel {id}")))
    }

    fn get_mut(&mut self, id: ChannelId) -> Result<&mut Channel> {
        self.channels
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("channel {id}")))
    }

    /// Non-archived channels of a workspace visible to the actor, in
    /// creation order.
    pub fn channels_for(&self, workspace_id: WorkspaceId, actor: &ActorSnapshot) -> Vec<&Channel> {
        let mut out: Vec<&Channel> = self
            .channels
            .values()
            .filter(|c| c.workspace_id == workspace_id && !c.archived)
            .filter(|c| gate::can_view(actor, c))
            .collect();
        out.sort_by_key(|c| c.created_at);
        out
    }

    fn name_taken(&self, workspace_id: WorkspaceId, name: &str) -> bool {
        self.channels.values().any(|c| {
            c.workspace_id == workspace_id && !c.archived && c.name.eq_ignore_ascii_case(name)
        })
    }

    // ------------------------------------------------------------------
    // Update / archive / delete
    // ------------------------------------------------------------------

    /// Apply a patch to a channel.
    ///
    /// System (non-custom) channels only allow name/description changes and
    /// only by a platform admin; their privacy flag is immutable.
    pub fn update_channel(
        &mut self,
        id: ChannelId,
        patch: ChannelPatch,
        actor: &ActorSnapshot,
    ) -> Result<&Channel> {
        // Validate the rename against siblings before taking a mutable borrow.
        if let Some(ref new_name) = patch.name {
            let new_name = new_name.trim();
            if new_name.is_empty() {
                return Err(CoreError::Validation("channel name is empty".into()));
            }
            let current = self.get(id)?;
            if !current.name.eq_ignore_ascii_case(new_name)
                && self.name_taken(current.workspace_id, new_name)
            {
                return Err(CoreError::Validation(format!(
                    "channel name '{new_name}' already exists in workspace"
                )));
            }
        }

        let channel = self.get_mut(id)?;
        if channel.kind.is_system() {
            if patch.private.is_some() {
                return Err(CoreError::Permission(
                    "privacy of a system channel is immutable".into(),
                ));
            }
            if (patch.name.is_some() || patch.description.is_some())
                && actor.role != atrium_shared::types::Role::Admin
            {
                return Err(CoreError::Permission(
                    "only an admin may rename a system channel".into(),
                ));
            }
        } else {
            let channel_admin = channel.membership(&actor.id).map(|m| m.role)
                == Some(ChannelRole::Admin);
            if !gate::can_manage(actor) && !channel_admin {
                return Err(CoreError::Permission(
                    "actor may not manage this channel".into(),
                ));
            }
        }

        if let Some(name) = patch.name {
            channel.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            channel.description = description;
        }
        if let Some(private) = patch.private {
            channel.private = private;
        }
        Ok(channel)
    }

    /// Archive a channel: retained with its messages, excluded from default
    /// listings.
    pub fn archive_channel(&mut self, id: ChannelId) -> Result<()> {
        let channel = self.get_mut(id)?;
        channel.archived = true;
        info!(channel = %id, "Channel archived");
        Ok(())
    }

    /// Hard-delete a custom channel.
    ///
    /// Returns the removed channel; the caller must cascade the purge of its
    /// messages and overlays.  System channels cannot be deleted.
    pub fn delete_channel(&mut self, id: ChannelId, actor: &ActorSnapshot) -> Result<Channel> {
        let channel = self.get(id)?;
        if !gate::can_manage(actor) {
            return Err(CoreError::Permission(
                "actor may not delete channels".into(),
            ));
        }
        if channel.kind.is_system() {
            return Err(CoreError::Permission(
                "system channels cannot be deleted".into(),
            ));
        }
        let removed = self.channels.remove(&id).expect("checked above");
        info!(channel = %id, "Channel deleted");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add an actor to a channel.  Idempotent.
    pub fn add_member(&mut self, id: ChannelId, actor: ActorId, role: ChannelRole) -> Result<()> {
        let channel = self.get_mut(id)?;
        if channel.membership(&actor).is_some() {
            return Ok(());
        }
        channel.members.push(ChannelMembership {
            actor_id: actor,
            role,
            muted: false,
        });
        Ok(())
    }

    /// Remove an actor from a channel.  Idempotent.
    ///
    /// Removing the sole remaining channel admin is an `Invariant` error;
    /// promote another member with [`set_member_role`] first.
    ///
    /// [`set_member_role`]: ChannelRegistry::set_member_role
    pub fn remove_member(&mut self, id: ChannelId, actor: &ActorId) -> Result<()> {
        let channel = self.get_mut(id)?;
        let Some(membership) = channel.membership(actor) else {
            return Ok(());
        };
        if membership.role == ChannelRole::Admin && channel.admin_count() == 1 {
            return Err(CoreError::Invariant(
                "cannot remove the last channel admin; reassign first".into(),
            ));
        }
        channel.members.retain(|m| &m.actor_id != actor);
        Ok(())
    }

    /// Change an existing member's channel role.
    pub fn set_member_role(
        &mut self,
        id: ChannelId,
        actor: &ActorId,
        role: ChannelRole,
    ) -> Result<()> {
        let channel = self.get_mut(id)?;
        if channel.membership(actor).map(|m| m.role) == Some(ChannelRole::Admin)
            && role == ChannelRole::Member
            && channel.admin_count() == 1
        {
            return Err(CoreError::Invariant(
                "cannot demote the last channel admin".into(),
            ));
        }
        let member = channel
            .members
            .iter_mut()
            .find(|m| &m.actor_id == actor)
            .ok_or_else(|| CoreError::NotFound(format!("member {actor} in channel {id}")))?;
        member.role = role;
        Ok(())
    }

    /// Toggle notification muting for a member.
    pub fn set_muted(&mut self, id: ChannelId, actor: &ActorId, muted: bool) -> Result<()> {
        let channel = self.get_mut(id)?;
        let member = channel
            .members
            .iter_mut()
            .find(|m| &m.actor_id == actor)
            .ok_or_else(|| CoreError::NotFound(format!("member {actor} in channel {id}")))?;
        member.muted = muted;
        Ok(())
    }

    /// Bump the channel's unread counter (called on foreign inserts).
    pub fn bump_unread(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.unread += 1;
        }
    }

    /// Clear the unread counter (called when the channel becomes active).
    pub fn mark_read(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.unread = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_shared::types::Role;

    fn staff(id: &str, role: Role) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId::from(id),
            name: id.to_string(),
            avatar: None,
            role,
        }
    }

    fn registry_with(name: &str) -> (ChannelRegistry, WorkspaceId, ChannelId) {
        let mut reg = ChannelRegistry::new();
        let ws = WorkspaceId::new();
        let id = reg
            .create_channel(ws, name, ChannelKind::Custom, false, &ActorId::from("a"), &[])
            .unwrap()
            .id;
        (reg, ws, id)
    }

    #[test]
    fn name_uniqueness_is_case_insensitive() {
        let (mut reg, ws, _) = registry_with("General");
        let err = reg
            .create_channel(ws, "general", ChannelKind::Custom, false, &ActorId::from("a"), &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        // Same name in a different workspace is fine.
        let other = WorkspaceId::new();
        assert!(reg
            .create_channel(other, "general", ChannelKind::Custom, false, &ActorId::from("a"), &[])
            .is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut reg = ChannelRegistry::new();
        let err = reg
            .create_channel(
                WorkspaceId::new(),
                "   ",
                ChannelKind::Custom,
                false,
                &ActorId::from("a"),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn archived_channel_frees_its_name() {
        let (mut reg, ws, id) = registry_with("campaign");
        reg.archive_channel(id).unwrap();
        assert!(reg
            .create_channel(ws, "Campaign", ChannelKind::Custom, false, &ActorId::from("a"), &[])
            .is_ok());
    }

    #[test]
    fn private_channel_auto_adds_creator_as_admin() {
        let mut reg = ChannelRegistry::new();
        let creator = ActorId::from("creator");
        let ch = reg
            .create_channel(
                WorkspaceId::new(),
                "war-room",
                ChannelKind::Custom,
                true,
                &creator,
                &[ActorId::from("other"), creator.clone()],
            )
            .unwrap();
        assert_eq!(ch.members.len(), 2);
        assert_eq!(ch.membership(&creator).unwrap().role, ChannelRole::Admin);
        assert_eq!(
            ch.membership(&ActorId::from("other")).unwrap().role,
            ChannelRole::Member
        );
    }

    #[test]
    fn system_channel_privacy_is_immutable() {
        let mut reg = ChannelRegistry::new();
        let id = reg
            .create_channel(
                WorkspaceId::new(),
                "general",
                ChannelKind::General,
                false,
                &ActorId::from("a"),
                &[],
            )
            .unwrap()
            .id;
        let admin = staff("a", Role::Admin);
        let err = reg
            .update_channel(
                id,
                ChannelPatch {
                    private: Some(true),
                    ..Default::default()
                },
                &admin,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));

        // Rename by an admin is allowed, by a manager it is not.
        assert!(reg
            .update_channel(
                id,
                ChannelPatch {
                    name: Some("lobby".into()),
                    ..Default::default()
                },
                &admin,
            )
            .is_ok());
        let err = reg
            .update_channel(
                id,
                ChannelPatch {
                    name: Some("hall".into()),
                    ..Default::default()
                },
                &staff("m", Role::Manager),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
    }

    #[test]
    fn system_channel_cannot_be_deleted() {
        let mut reg = ChannelRegistry::new();
        let id = reg
            .create_channel(
                WorkspaceId::new(),
                "billing",
                ChannelKind::Billing,
                false,
                &ActorId::from("a"),
                &[],
            )
            .unwrap()
            .id;
        let err = reg.delete_channel(id, &staff("a", Role::Admin)).unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
    }

    #[test]
    fn member_ops_are_idempotent() {
        let (mut reg, _, id) = registry_with("room");
        let bob = ActorId::from("bob");
        reg.add_member(id, bob.clone(), ChannelRole::Member).unwrap();
        reg.add_member(id, bob.clone(), ChannelRole::Admin).unwrap();
        assert_eq!(reg.get(id).unwrap().members.len(), 1);
        // First add wins; duplicate add does not change the role.
        assert_eq!(
            reg.get(id).unwrap().membership(&bob).unwrap().role,
            ChannelRole::Member
        );

        reg.remove_member(id, &bob).unwrap();
        reg.remove_member(id, &bob).unwrap();
        assert!(reg.get(id).unwrap().members.is_empty());
    }

    #[test]
    fn last_admin_cannot_be_removed_until_reassigned() {
        let (mut reg, _, id) = registry_with("room");
        let alice = ActorId::from("alice");
        let bob = ActorId::from("bob");
        reg.add_member(id, alice.clone(), ChannelRole::Admin).unwrap();
        reg.add_member(id, bob.clone(), ChannelRole::Member).unwrap();

        let err = reg.remove_member(id, &alice).unwrap_err();
        assert!(matches!(err, CoreError::Invariant(_)));
        let err = reg
            .set_member_role(id, &alice, ChannelRole::Member)
            .unwrap_err();
        assert!(matches!(err, CoreError::Invariant(_)));

        reg.set_member_role(id, &bob, ChannelRole::Admin).unwrap();
        reg.remove_member(id, &alice).unwrap();
        assert_eq!(reg.get(id).unwrap().admin_count(), 1);
    }

    #[test]
    fn internal_channels_hidden_from_clients_in_listing() {
        let mut reg = ChannelRegistry::new();
        let ws = WorkspaceId::new();
        reg.create_channel(ws, "general", ChannelKind::General, false, &ActorId::from("a"), &[])
            .unwrap();
        reg.create_channel(ws, "internal", ChannelKind::Internal, false, &ActorId::from("a"), &[])
            .unwrap();

        let client = staff("c", Role::Client);
        let names: Vec<_> = reg
            .channels_for(ws, &client)
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["general"]);
        assert_eq!(reg.channels_for(ws, &staff("m", Role::Member)).len(), 2);
    }
}
