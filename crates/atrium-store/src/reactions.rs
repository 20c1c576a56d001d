//! Reaction aggregation: per-message emoji → actor-set toggles.

use tracing::debug;

use atrium_shared::types::{ActorId, MessageId};
use atrium_shared::Result;

use crate::messages::MessageStore;

/// Outcome of a local toggle, so the caller knows which remote call
/// (add or remove) must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionToggle {
    Added,
    Removed,
}

impl MessageStore {
    /// Toggle `actor`'s reaction with `emoji` on a message.
    ///
    /// An actor holds at most one membership per emoji per message; the
    /// count of a reaction is always the cardinality of its actor set.
    /// Empty sets are dropped so the emoji entry disappears with its last
    /// reactor.
    pub fn toggle_reaction(
        &mut self,
        id: &MessageId,
        emoji: &str,
        actor: &ActorId,
    ) -> Result<ReactionToggle> {
        let message = self.get_reactable_mut(id)?;
        let set = message.reactions.entry(emoji.to_string()).or_default();
        let outcome = if set.remove(actor) {
            ReactionToggle::Removed
        } else {
            set.insert(actor.clone());
            ReactionToggle::Added
        };
        if set.is_empty() {
            message.reactions.remove(emoji);
        }
        debug!(msg_id = %id, emoji, actor = %actor, ?outcome, "Reaction toggled");
        Ok(outcome)
    }

    /// Apply an authoritative reaction event from the change feed.
    /// Idempotent: re-adding a present actor or removing an absent one is a
    /// no-op, so a replayed event cannot skew counts.
    pub fn apply_remote_reaction(
        &mut self,
        id: &MessageId,
        emoji: &str,
        actor: &ActorId,
        added: bool,
    ) -> Result<()> {
        let message = self.get_reactable_mut(id)?;
        if added {
            message
                .reactions
                .entry(emoji.to_string())
                .or_default()
                .insert(actor.clone());
        } else if let Some(set) = message.reactions.get_mut(emoji) {
            set.remove(actor);
            if set.is_empty() {
                message.reactions.remove(emoji);
            }
        }
        Ok(())
    }

    fn get_reactable_mut(&mut self, id: &MessageId) -> Result<&mut crate::models::Message> {
        let message = self.get_mut(id)?;
        if message.deleted_for_everyone {
            return Err(atrium_shared::CoreError::Invariant(
                "deleted messages cannot be reacted to".into(),
            ));
        }
        Ok(message)
    }
}
