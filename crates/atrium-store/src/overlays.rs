//! Per-actor visibility overlays.
//!
//! Saved and hidden flags are actor-scoped: a shared boolean on the message
//! record cannot represent several actors' independent states, so they live
//! here as (actor, message) sets and never leak into another actor's view.

use std::collections::HashSet;

use atrium_shared::types::{ActorId, MessageId};

#[derive(Debug, Default)]
pub struct OverlayStore {
    saved: HashSet<(ActorId, MessageId)>,
    hidden: HashSet<(ActorId, MessageId)>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the saved flag for an actor.  Returns the new state.
    pub fn toggle_saved(&mut self, actor: &ActorId, message: &MessageId) -> bool {
        let key = (actor.clone(), message.clone());
        if self.saved.remove(&key) {
            false
        } else {
            self.saved.insert(key);
            true
        }
    }

    pub fn is_saved(&self, actor: &ActorId, message: &MessageId) -> bool {
        self.saved.contains(&(actor.clone(), message.clone()))
    }

    /// Message ids the actor has saved, in no particular order.
    pub fn saved_for(&self, actor: &ActorId) -> Vec<MessageId> {
        self.saved
            .iter()
            .filter(|(a, _)| a == actor)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Hide a message from one actor's view (delete-for-me).  Idempotent.
    pub fn hide(&mut self, actor: &ActorId, message: &MessageId) {
        self.hidden.insert((actor.clone(), message.clone()));
    }

    /// Undo a hide (rollback after a rejected remote delete-for-me).
    pub fn unhide(&mut self, actor: &ActorId, message: &MessageId) {
        self.hidden.remove(&(actor.clone(), message.clone()));
    }

    pub fn is_hidden(&self, actor: &ActorId, message: &MessageId) -> bool {
        self.hidden.contains(&(actor.clone(), message.clone()))
    }

    /// Rekey overlays when an optimistic id is replaced by the server id.
    pub fn rename_message(&mut self, old: &MessageId, new: &MessageId) {
        for set in [&mut self.saved, &mut self.hidden] {
            let keys: Vec<ActorId> = set
                .iter()
                .filter(|(_, m)| m == old)
                .map(|(a, _)| a.clone())
                .collect();
            for actor in keys {
                set.remove(&(actor.clone(), old.clone()));
                set.insert((actor, new.clone()));
            }
        }
    }

    /// Drop all overlay state for purged messages.
    pub fn purge_messages(&mut self, messages: &[MessageId]) {
        self.saved.retain(|(_, m)| !messages.contains(m));
        self.hidden.retain(|(_, m)| !messages.contains(m));
    }
}
