//! The combined in-memory core state.
//!
//! Wrapped in `Arc<Mutex<..>>` by the session layer so local actor actions
//! and inbound feed events mutate the same structures through the same
//! entry points.

use crate::channels::ChannelRegistry;
use crate::messages::MessageStore;
use crate::overlays::OverlayStore;
use crate::workspaces::WorkspaceDirectory;

#[derive(Debug, Default)]
pub struct CoreState {
    pub workspaces: WorkspaceDirectory,
    pub channels: ChannelRegistry,
    pub messages: MessageStore,
    pub overlays: OverlayStore,
}

impl CoreState {
    pub fn new() -> Self {
        Self::default()
    }
}
