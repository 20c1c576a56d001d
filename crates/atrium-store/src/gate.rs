//! Membership gate: pure visibility and management predicates.

use atrium_shared::types::ActorSnapshot;

use crate::models::{Channel, ChannelKind};

/// Whether the actor may see the channel at all.
///
/// Internal channels are staff-only.  Private channels are additionally
/// restricted to their membership list for client roles; staff see every
/// channel of the workspaces they operate.
pub fn can_view(actor: &ActorSnapshot, channel: &Channel) -> bool {
    if channel.kind == ChannelKind::Internal {
        return actor.role.is_staff();
    }
    if channel.private && !actor.role.is_staff() {
        return channel.membership(&actor.id).is_some();
    }
    true
}

/// Whether the actor may manage channels (create custom ones, update,
/// archive, delete, moderate membership).
pub fn can_manage(actor: &ActorSnapshot) -> bool {
    actor.role.can_manage()
}
