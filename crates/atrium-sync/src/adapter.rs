//! Real-time feed adapter.
//!
//! One pump task per subscribed channel drains that channel's event
//! receiver sequentially, so feed events for a channel are never applied
//! out of receipt order; events for different channels interleave freely on
//! their own tasks.  Attaching a channel that already has a pump replaces
//! it — at most one live subscription per channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use atrium_shared::protocol::ChannelEvent;
use atrium_shared::types::{ActorId, ChannelId};
use atrium_shared::Result;
use atrium_store::models::ChannelRole;
use atrium_store::CoreState;

use crate::notify::CoreNotification;
use crate::sender::lock;
use crate::services::ChangeFeed;

pub struct FeedAdapter {
    state: Arc<Mutex<CoreState>>,
    feed: Arc<dyn ChangeFeed>,
    notify: mpsc::Sender<CoreNotification>,
    /// The session's own actor; their echoes never bump unread counters.
    self_actor: ActorId,
    pumps: Mutex<HashMap<ChannelId, JoinHandle<()>>>,
}

impl FeedAdapter {
    pub fn new(
        state: Arc<Mutex<CoreState>>,
        feed: Arc<dyn ChangeFeed>,
        notify: mpsc::Sender<CoreNotification>,
        self_actor: ActorId,
    ) -> Self {
        Self {
            state,
            feed,
            notify,
            self_actor,
            pumps: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a channel's change feed and start its pump, replacing
    /// any previous subscription for the same channel.
    pub async fn attach(&self, channel: ChannelId) -> Result<()> {
        let subscription = self.feed.subscribe(channel).await?;
        info!(channel = %channel, "Feed attached");

        let state = Arc::clone(&self.state);
        let notify = self.notify.clone();
        let self_actor = self.self_actor.clone();
        let pump = tokio::spawn(async move {
            let mut events = subscription.events;
            while let Some(event) = events.recv().await {
                fold_event(&state, &notify, &self_actor, channel, event).await;
            }
            debug!(channel = %channel, "Feed pump finished");
        });

        let previous = self
            .pumps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(channel, pump);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Stop the pump for a channel.  Dropping the receiver signals the feed
    /// implementation to unsubscribe.
    pub fn detach(&self, channel: ChannelId) {
        if let Some(pump) = self
            .pumps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&channel)
        {
            pump.abort();
            info!(channel = %channel, "Feed detached");
        }
    }

    /// Stop every pump (session shutdown).
    pub fn detach_all(&self) {
        let mut pumps = self.pumps.lock().unwrap_or_else(|p| p.into_inner());
        for (_, pump) in pumps.drain() {
            pump.abort();
        }
    }

    /// Whether a channel currently has a live pump.
    pub fn is_attached(&self, channel: ChannelId) -> bool {
        self.pumps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(&channel)
    }
}

impl Drop for FeedAdapter {
    fn drop(&mut self) {
        self.detach_all();
    }
}

/// Apply one authoritative event to the store.
///
/// The server has already validated the action, so update events skip the
/// policy checks of the local mutation path.  A fold failure (e.g. an event
/// for a message outside the loaded window) is logged and skipped, never
/// fatal to the pump.
async fn fold_event(
    state: &Mutex<CoreState>,
    notify: &mpsc::Sender<CoreNotification>,
    self_actor: &ActorId,
    channel: ChannelId,
    event: ChannelEvent,
) {
    let unread_change = {
        let mut state = lock(state);
        let result = match event {
            ChannelEvent::MessageInserted(record) => {
                let foreign = record.sender.id != *self_actor;
                let preview = record.content.clone();
                let at = record.timestamp;
                let mut unread = None;
                match state.messages.reconcile_incoming(record) {
                    Some(message) if foreign && !message.is_system => {
                        state.channels.bump_unread(channel);
                        let badge = state
                            .channels
                            .get(channel)
                            .map(|c| (c.workspace_id, c.unread));
                        if let Ok((workspace, count)) = badge {
                            let _ = state.workspaces.record_activity(workspace, &preview, at);
                            unread = Some(count);
                        }
                    }
                    _ => {}
                }
                Ok(unread)
            }
            ChannelEvent::MessageEdited { id, content } => {
                state.messages.apply_remote_edit(&id, &content).map(|_| None)
            }
            ChannelEvent::MessageDeleted { id, for_everyone } => state
                .messages
                .apply_remote_delete(&id, for_everyone)
                .map(|_| None),
            ChannelEvent::MessagePinned { id, pinned } => {
                state.messages.apply_remote_pin(&id, pinned).map(|_| None)
            }
            ChannelEvent::ReactionToggled {
                message_id,
                emoji,
                actor_id,
                added,
            } => state
                .messages
                .apply_remote_reaction(&message_id, &emoji, &actor_id, added)
                .map(|_| None),
            ChannelEvent::MembershipChanged {
                channel_id,
                actor_id,
                joined,
            } => {
                if joined {
                    state
                        .channels
                        .add_member(channel_id, actor_id, ChannelRole::Member)
                } else {
                    state.channels.remove_member(channel_id, &actor_id)
                }
                .map(|_| None)
            }
        };
        match result {
            Ok(unread) => unread,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Feed event skipped");
                None
            }
        }
    };

    if let Some(unread) = unread_change {
        let _ = notify
            .send(CoreNotification::UnreadChanged {
                channel_id: channel,
                unread,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use atrium_shared::protocol::MessageRecord;
    use atrium_shared::types::{ActorSnapshot, MessageId, Role, WorkspaceId};
    use atrium_store::models::{ChannelKind, Workspace};

    use crate::services::FeedSubscription;

    /// Route pump logs through the test harness; filter with `RUST_LOG`.
    fn init_tracing() {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    fn actor(id: &str, role: Role) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId::from(id),
            name: id.to_string(),
            avatar: None,
            role,
        }
    }

    /// Feed fake: hands out a receiver per subscribe call and tracks how
    /// many subscriptions were opened per channel.
    struct ScriptedFeed {
        senders: Mutex<Vec<(ChannelId, mpsc::Sender<ChannelEvent>)>>,
    }

    impl ScriptedFeed {
        fn new() -> Self {
            Self {
                senders: Mutex::new(Vec::new()),
            }
        }

        fn sender_for(&self, channel: ChannelId) -> mpsc::Sender<ChannelEvent> {
            self.senders
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(c, _)| *c == channel)
                .map(|(_, tx)| tx.clone())
                .expect("no subscription for channel")
        }

        fn subscription_count(&self, channel: ChannelId) -> usize {
            self.senders
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == channel)
                .count()
        }
    }

    #[async_trait]
    impl ChangeFeed for ScriptedFeed {
        async fn subscribe(&self, channel: ChannelId) -> Result<FeedSubscription> {
            let (tx, rx) = mpsc::channel(32);
            self.senders.lock().unwrap().push((channel, tx));
            Ok(FeedSubscription { events: rx })
        }
    }

    fn harness() -> (
        Arc<Mutex<CoreState>>,
        Arc<ScriptedFeed>,
        FeedAdapter,
        mpsc::Receiver<CoreNotification>,
        ChannelId,
    ) {
        init_tracing();
        let mut core = CoreState::new();
        let ws = WorkspaceId::new();
        core.workspaces.upsert(Workspace::new(ws, "Acme", "🏢"));
        let channel = core
            .channels
            .create_channel(ws, "general", ChannelKind::General, false, &ActorId::from("me"), &[])
            .unwrap()
            .id;

        let state = Arc::new(Mutex::new(core));
        let feed = Arc::new(ScriptedFeed::new());
        let (notify_tx, notify_rx) = mpsc::channel(32);
        let adapter = FeedAdapter::new(
            Arc::clone(&state),
            feed.clone() as Arc<dyn ChangeFeed>,
            notify_tx,
            ActorId::from("me"),
        );
        (state, feed, adapter, notify_rx, channel)
    }

    #[tokio::test]
    async fn insert_events_fold_without_duplicates() {
        let (state, feed, adapter, mut notify, channel) = harness();
        adapter.attach(channel).await.unwrap();

        let record = MessageRecord::new("srv-1", channel, actor("them", Role::Client), "hi");
        let tx = feed.sender_for(channel);
        tx.send(ChannelEvent::MessageInserted(record.clone()))
            .await
            .unwrap();
        tx.send(ChannelEvent::MessageInserted(record)).await.unwrap();

        // The first insert produces an unread notification; wait on it so
        // both events are known to be folded (the pump is sequential).
        let n = notify.recv().await.unwrap();
        assert_eq!(
            n,
            CoreNotification::UnreadChanged {
                channel_id: channel,
                unread: 1
            }
        );

        let state = state.lock().unwrap();
        assert_eq!(state.messages.channel_messages(channel).len(), 1);
        assert_eq!(state.channels.get(channel).unwrap().unread, 1);
        let ws_id = state.channels.get(channel).unwrap().workspace_id;
        assert_eq!(state.workspaces.get(ws_id).unwrap().unread, 1);
    }

    #[tokio::test]
    async fn own_echo_does_not_bump_unread() {
        let (state, feed, adapter, _notify, channel) = harness();
        adapter.attach(channel).await.unwrap();

        let record = MessageRecord::new("srv-2", channel, actor("me", Role::Member), "mine");
        feed.sender_for(channel)
            .send(ChannelEvent::MessageInserted(record))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let state = state.lock().unwrap();
        assert_eq!(state.messages.channel_messages(channel).len(), 1);
        assert_eq!(state.channels.get(channel).unwrap().unread, 0);
    }

    #[tokio::test]
    async fn update_events_apply_without_policy_checks() {
        let (state, feed, adapter, _notify, channel) = harness();
        adapter.attach(channel).await.unwrap();

        let sender = actor("them", Role::Client);
        let tx = feed.sender_for(channel);
        tx.send(ChannelEvent::MessageInserted(MessageRecord::new(
            "srv-3", channel, sender, "draft",
        )))
        .await
        .unwrap();
        // An edit the local policy would reject (not the sender): the
        // server is authoritative.
        tx.send(ChannelEvent::MessageEdited {
            id: MessageId::from("srv-3"),
            content: "final".into(),
        })
        .await
        .unwrap();
        tx.send(ChannelEvent::MessagePinned {
            id: MessageId::from("srv-3"),
            pinned: true,
        })
        .await
        .unwrap();
        tx.send(ChannelEvent::ReactionToggled {
            message_id: MessageId::from("srv-3"),
            emoji: "👍".into(),
            actor_id: ActorId::from("them"),
            added: true,
        })
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let state = state.lock().unwrap();
        let msg = state.messages.get(&MessageId::from("srv-3")).unwrap();
        assert_eq!(msg.content, "final");
        assert!(msg.edited);
        assert!(msg.pinned);
        assert_eq!(msg.reactions["👍"].len(), 1);
    }

    #[tokio::test]
    async fn reattach_replaces_the_previous_subscription() {
        let (_state, feed, adapter, _notify, channel) = harness();
        adapter.attach(channel).await.unwrap();
        adapter.attach(channel).await.unwrap();
        assert_eq!(feed.subscription_count(channel), 2);
        assert!(adapter.is_attached(channel));

        // The first pump is gone; its sender reports a closed receiver.
        let first = feed.senders.lock().unwrap()[0].1.clone();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(first.is_closed());

        adapter.detach(channel);
        assert!(!adapter.is_attached(channel));
    }

    #[tokio::test]
    async fn unknown_message_events_are_skipped_not_fatal() {
        let (state, feed, adapter, _notify, channel) = harness();
        adapter.attach(channel).await.unwrap();

        let tx = feed.sender_for(channel);
        tx.send(ChannelEvent::MessageEdited {
            id: MessageId::from("srv-unknown"),
            content: "x".into(),
        })
        .await
        .unwrap();
        tx.send(ChannelEvent::MessageInserted(MessageRecord::new(
            "srv-4",
            channel,
            actor("them", Role::Client),
            "still alive",
        )))
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let state = state.lock().unwrap();
        assert_eq!(state.messages.channel_messages(channel).len(), 1);
    }

    #[tokio::test]
    async fn membership_events_update_the_registry() {
        let (state, feed, adapter, _notify, channel) = harness();
        adapter.attach(channel).await.unwrap();

        let tx = feed.sender_for(channel);
        tx.send(ChannelEvent::MembershipChanged {
            channel_id: channel,
            actor_id: ActorId::from("newcomer"),
            joined: true,
        })
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(
            state.lock().unwrap().channels.get(channel).unwrap().members.len(),
            1
        );

        tx.send(ChannelEvent::MembershipChanged {
            channel_id: channel,
            actor_id: ActorId::from("newcomer"),
            joined: false,
        })
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(state.lock().unwrap().channels.get(channel).unwrap().members.is_empty());
    }
}
