//! Collaborator service traits.
//!
//! Implementations live outside this workspace (HTTP, websocket, supabase,
//! in-process fakes for tests).  Every remote failure maps to
//! `CoreError::Transport`; none of these calls is allowed to block a local
//! state mutation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use atrium_shared::protocol::{ChannelEvent, FileAttachment, MessageEnvelope};
use atrium_shared::types::{ActorId, ActorSnapshot, ChannelId, MessageId, WorkspaceId};
use atrium_shared::Result;

/// Persistence/transport service for messages and message mutations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Persist a message; returns the server-assigned canonical id.
    async fn send_message(&self, envelope: MessageEnvelope) -> Result<MessageId>;

    async fn edit_message(&self, id: &MessageId, content: &str) -> Result<()>;

    async fn delete_message(&self, id: &MessageId, for_everyone: bool) -> Result<()>;

    async fn pin_message(&self, id: &MessageId, channel: ChannelId, actor: &ActorId)
        -> Result<()>;

    async fn unpin_message(&self, id: &MessageId) -> Result<()>;

    async fn add_reaction(&self, id: &MessageId, emoji: &str, actor: &ActorId) -> Result<()>;

    async fn remove_reaction(&self, id: &MessageId, emoji: &str, actor: &ActorId) -> Result<()>;

    /// Persist a forwarded copy in the target channel; returns its id.
    async fn forward_message(
        &self,
        id: &MessageId,
        target_channel: ChannelId,
        forwarder: &ActorSnapshot,
        source_channel_name: &str,
    ) -> Result<MessageId>;

    async fn upload_file(
        &self,
        data: Vec<u8>,
        name: &str,
        mime_type: &str,
        channel: ChannelId,
    ) -> Result<FileAttachment>;
}

/// A live per-channel subscription.  Dropping the receiver (or the whole
/// subscription) is the unsubscribe signal to the feed implementation.
pub struct FeedSubscription {
    pub events: mpsc::Receiver<ChannelEvent>,
}

/// Change-feed subscription service delivering authoritative events with
/// the same shape as persisted records.  Implementations key their upstream
/// subscriptions by [`ChannelId::to_topic`].
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, channel: ChannelId) -> Result<FeedSubscription>;
}

/// External campaign/deliverable record service.
#[async_trait]
pub trait CampaignService: Send + Sync {
    async fn create_campaign(
        &self,
        client_id: &str,
        platform: &str,
        budget: u64,
        goal: &str,
        audience: &str,
        duration: &str,
    ) -> Result<String>;

    async fn create_deliverable(
        &self,
        client_id: &str,
        title: &str,
        kind: &str,
        status: &str,
    ) -> Result<String>;
}

/// External wallet/package service.  Insufficient funds surfaces as a
/// `Transport` error and is non-fatal to the chat flow.
#[async_trait]
pub trait WalletService: Send + Sync {
    async fn debit(
        &self,
        client_id: &str,
        amount: u64,
        memo: &str,
        ref_type: &str,
        ref_id: &str,
    ) -> Result<()>;
}

/// Membership/identity provider consumed by the session layer and the
/// membership gate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn actor(&self, id: &ActorId) -> Result<ActorSnapshot>;

    async fn member_channels(
        &self,
        workspace: WorkspaceId,
        actor: &ActorId,
    ) -> Result<Vec<ChannelId>>;
}
