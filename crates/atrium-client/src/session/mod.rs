//! One [`Session`] per signed-in actor.
//!
//! Local mutations are synchronous against the shared [`CoreState`]; every
//! remote call is fire-and-forget with its outcome folded back by a spawned
//! task or an inbound feed event.  Nothing here blocks on the network.

mod channels;
mod messaging;
mod workspaces;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::info;

use atrium_shared::types::{ActorId, ActorSnapshot, ChannelId};
use atrium_shared::{CoreError, Result};
use atrium_store::{gate, CoreState};
use atrium_sync::{
    CampaignService, ChangeFeed, CoreNotification, FeedAdapter, IdentityProvider,
    SystemConfig, SystemMessageGenerator, Transport, WalletService,
};

use crate::config::SessionConfig;

const NOTIFY_BUFFER: usize = 256;

/// Handles to the external collaborator services a session runs against.
#[derive(Clone)]
pub struct SessionServices {
    pub transport: Arc<dyn Transport>,
    pub feed: Arc<dyn ChangeFeed>,
    pub campaigns: Arc<dyn CampaignService>,
    pub wallet: Arc<dyn WalletService>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// A signed-in actor's messaging session.
pub struct Session {
    actor: ActorSnapshot,
    state: Arc<Mutex<CoreState>>,
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
    adapter: FeedAdapter,
    generator: SystemMessageGenerator,
    notify: mpsc::Sender<CoreNotification>,
    config: SessionConfig,
    active_channel: Mutex<Option<ChannelId>>,
}

impl Session {
    /// Resolve the actor through the identity provider and assemble the
    /// session.  Returns the notification receiver alongside it.
    pub async fn connect(
        actor_id: ActorId,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<CoreNotification>)> {
        let actor = services.identity.actor(&actor_id).await?;
        info!(actor = %actor.id, role = ?actor.role, "Session connected");

        let state = Arc::new(Mutex::new(CoreState::new()));
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_BUFFER);

        let adapter = FeedAdapter::new(
            Arc::clone(&state),
            Arc::clone(&services.feed),
            notify_tx.clone(),
            actor.id.clone(),
        );
        let generator = SystemMessageGenerator::new(
            Arc::clone(&state),
            Arc::clone(&services.transport),
            Arc::clone(&services.campaigns),
            Arc::clone(&services.wallet),
            notify_tx.clone(),
            SystemConfig {
                delivered_delay: config.delivered_delay(),
                deliverable_price: config.deliverable_price.clone(),
            },
        );

        let session = Self {
            actor,
            state,
            transport: services.transport,
            identity: services.identity,
            adapter,
            generator,
            notify: notify_tx,
            config,
            active_channel: Mutex::new(None),
        };
        Ok((session, notify_rx))
    }

    pub fn actor(&self) -> &ActorSnapshot {
        &self.actor
    }

    /// Lock the shared core state, recovering from poisoning (store methods
    /// are transactional, so a panicked task leaves no partial writes).
    pub(crate) fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switch the active channel, moving the single live feed subscription
    /// with it.  In-flight sends for the previous channel keep running and
    /// land in its history.
    pub async fn set_active_channel(&self, channel: Option<ChannelId>) -> Result<()> {
        if let Some(id) = channel {
            {
                let state = self.lock();
                let target = state.channels.get(id)?;
                if !gate::can_view(&self.actor, target) {
                    return Err(CoreError::Permission(format!(
                        "actor may not view channel {id}"
                    )));
                }
            }
            self.adapter.attach(id).await?;
            let mut state = self.lock();
            state.channels.mark_read(id);
        }

        let previous = {
            let mut active = self
                .active_channel
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *active, channel)
        };
        if let Some(prev) = previous {
            if Some(prev) != channel {
                self.adapter.detach(prev);
            }
        }
        Ok(())
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        *self
            .active_channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tear down every live subscription.  Spawned sends continue to
    /// completion so no optimistic write is silently lost.
    pub fn shutdown(&self) {
        self.adapter.detach_all();
        info!(actor = %self.actor.id, "Session shut down");
    }
}
