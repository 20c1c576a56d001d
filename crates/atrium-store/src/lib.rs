//! # atrium-store
//!
//! In-memory core state for the workspace messaging subsystem: the channel
//! registry, the per-channel message store with optimistic/confirmed
//! reconciliation, the reaction aggregator, per-actor visibility overlays,
//! and the workspace directory.
//!
//! Persistence is the external transport's concern; every structure here is
//! plain owned data mutated synchronously.  Local actor actions and inbound
//! feed events go through the same entry points so the two paths can never
//! diverge.

pub mod channels;
pub mod gate;
pub mod messages;
pub mod models;
pub mod overlays;
pub mod reactions;
pub mod state;
pub mod workspaces;

pub use channels::{ChannelPatch, ChannelRegistry};
pub use messages::{EditPolicy, MessageStore};
pub use models::*;
pub use overlays::OverlayStore;
pub use reactions::ReactionToggle;
pub use state::CoreState;
pub use workspaces::{WorkspaceDirectory, WorkspaceFilter, WorkspaceSort};
