//! System message generation for cross-domain business actions.
//!
//! A boost submission or deliverable request first becomes a local system
//! message carrying its structured tag — that announcement is durable even
//! when the downstream campaign/wallet calls fail, which are retried
//! out-of-band by operators.  The same content then goes through the normal
//! send path so other participants receive it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use atrium_shared::protocol::MessageEnvelope;
use atrium_shared::tags::{
    BoostStatus, BoostTag, DeliverableStatus, DeliverableTag, SystemTag,
};
use atrium_shared::types::{ChannelId, WorkspaceId};
use atrium_store::{CoreState, Message};

use crate::notify::CoreNotification;
use crate::sender::{lock, spawn_send};
use crate::services::{CampaignService, Transport, WalletService};

/// Boost (paid campaign) submission from an intake flow.
#[derive(Debug, Clone)]
pub struct BoostSubmitted {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    /// Billing identity of the client in the external services.
    pub client_id: String,
    pub platform: String,
    pub budget: u64,
    pub duration: String,
    pub goal: String,
    pub audience: String,
}

/// Deliverable request from an intake flow.
#[derive(Debug, Clone)]
pub struct DeliverableRequested {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    pub client_id: String,
    pub title: String,
    pub kind: String,
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Delay before a confirmed system message is marked delivered.
    pub delivered_delay: Duration,
    /// Price per deliverable kind, in whole currency units.  Kinds without
    /// a price produce no wallet debit.
    pub deliverable_price: HashMap<String, u64>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            delivered_delay: Duration::from_millis(
                atrium_shared::constants::DEFAULT_DELIVERED_DELAY_MS,
            ),
            deliverable_price: HashMap::new(),
        }
    }
}

pub struct SystemMessageGenerator {
    state: Arc<Mutex<CoreState>>,
    transport: Arc<dyn Transport>,
    campaigns: Arc<dyn CampaignService>,
    wallet: Arc<dyn WalletService>,
    notify: mpsc::Sender<CoreNotification>,
    config: SystemConfig,
}

impl SystemMessageGenerator {
    pub fn new(
        state: Arc<Mutex<CoreState>>,
        transport: Arc<dyn Transport>,
        campaigns: Arc<dyn CampaignService>,
        wallet: Arc<dyn WalletService>,
        notify: mpsc::Sender<CoreNotification>,
        config: SystemConfig,
    ) -> Self {
        Self {
            state,
            transport,
            campaigns,
            wallet,
            notify,
            config,
        }
    }

    /// Announce a submitted boost and kick off its side effects.
    ///
    /// Returns the optimistic local system message synchronously.
    pub fn boost_submitted(&self, event: BoostSubmitted) -> Message {
        let content = format!(
            "🚀 Boost requested on {} — budget {} for {}. Goal: {}",
            event.platform, event.budget, event.duration, event.goal
        );
        let tag = SystemTag::Boost(BoostTag {
            platform: event.platform.clone(),
            budget: event.budget,
            duration: event.duration.clone(),
            goal: event.goal.clone(),
            status: BoostStatus::Requested,
        });
        let message = self.announce(event.channel_id, &content, tag);
        info!(workspace = %event.workspace_id, channel = %event.channel_id,
              platform = %event.platform, budget = event.budget, "Boost submitted");

        let campaigns = Arc::clone(&self.campaigns);
        let wallet = Arc::clone(&self.wallet);
        let notify = self.notify.clone();
        tokio::spawn(async move {
            match campaigns
                .create_campaign(
                    &event.client_id,
                    &event.platform,
                    event.budget,
                    &event.goal,
                    &event.audience,
                    &event.duration,
                )
                .await
            {
                Ok(campaign_id) => {
                    if let Err(e) = wallet
                        .debit(
                            &event.client_id,
                            event.budget,
                            &format!("Boost on {}", event.platform),
                            "campaign",
                            &campaign_id,
                        )
                        .await
                    {
                        warn!(campaign = %campaign_id, error = %e, "Boost debit failed");
                        let _ = notify
                            .send(CoreNotification::SystemActionFailed {
                                action: "boost-debit",
                                error: e.to_string(),
                            })
                            .await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Campaign creation failed");
                    let _ = notify
                        .send(CoreNotification::SystemActionFailed {
                            action: "campaign-create",
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        });
        message
    }

    /// Announce a requested deliverable and kick off its side effects.
    pub fn deliverable_requested(&self, event: DeliverableRequested) -> Message {
        let content = format!(
            "📦 New deliverable requested: {} ({})",
            event.title, event.kind
        );
        let tag = SystemTag::Deliverable(DeliverableTag {
            title: event.title.clone(),
            deliverable_kind: event.kind.clone(),
            status: DeliverableStatus::Pending,
        });
        let message = self.announce(event.channel_id, &content, tag);
        info!(workspace = %event.workspace_id, channel = %event.channel_id,
              kind = %event.kind, "Deliverable requested");

        let price = self.config.deliverable_price.get(&event.kind).copied();
        let campaigns = Arc::clone(&self.campaigns);
        let wallet = Arc::clone(&self.wallet);
        let notify = self.notify.clone();
        tokio::spawn(async move {
            match campaigns
                .create_deliverable(&event.client_id, &event.title, &event.kind, "pending")
                .await
            {
                Ok(deliverable_id) => {
                    let Some(amount) = price else { return };
                    if let Err(e) = wallet
                        .debit(
                            &event.client_id,
                            amount,
                            &format!("Deliverable: {}", event.title),
                            "deliverable",
                            &deliverable_id,
                        )
                        .await
                    {
                        warn!(deliverable = %deliverable_id, error = %e, "Deliverable debit failed");
                        let _ = notify
                            .send(CoreNotification::SystemActionFailed {
                                action: "deliverable-debit",
                                error: e.to_string(),
                            })
                            .await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Deliverable creation failed");
                    let _ = notify
                        .send(CoreNotification::SystemActionFailed {
                            action: "deliverable-create",
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        });
        message
    }

    /// Append the optimistic system message, then persist it through the
    /// normal send path.
    fn announce(&self, channel: ChannelId, content: &str, tag: SystemTag) -> Message {
        let message = lock(&self.state)
            .messages
            .append_system(channel, content, Some(tag.clone()));

        let envelope = MessageEnvelope {
            channel_id: channel,
            sender: message.sender.clone(),
            content: message.content.clone(),
            reply: None,
            attachments: Vec::new(),
            tag: Some(tag),
            is_system: true,
        };
        spawn_send(
            Arc::clone(&self.state),
            Arc::clone(&self.transport),
            self.notify.clone(),
            message.id.clone(),
            envelope,
            self.config.delivered_delay,
        );
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    use atrium_shared::types::{ActorId, MessageId};
    use atrium_shared::{CoreError, Result};
    use atrium_store::models::DeliveryStatus;

    /// Transport fake that assigns sequential server ids.
    struct OkTransport {
        counter: AtomicU64,
    }

    impl OkTransport {
        fn new() -> Self {
            Self {
                counter: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for OkTransport {
        async fn send_message(&self, _envelope: MessageEnvelope) -> Result<MessageId> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(MessageId(format!("srv-{n}")))
        }
        async fn edit_message(&self, _: &MessageId, _: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_message(&self, _: &MessageId, _: bool) -> Result<()> {
            Ok(())
        }
        async fn pin_message(&self, _: &MessageId, _: ChannelId, _: &ActorId) -> Result<()> {
            Ok(())
        }
        async fn unpin_message(&self, _: &MessageId) -> Result<()> {
            Ok(())
        }
        async fn add_reaction(&self, _: &MessageId, _: &str, _: &ActorId) -> Result<()> {
            Ok(())
        }
        async fn remove_reaction(&self, _: &MessageId, _: &str, _: &ActorId) -> Result<()> {
            Ok(())
        }
        async fn forward_message(
            &self,
            _: &MessageId,
            _: ChannelId,
            _: &atrium_shared::types::ActorSnapshot,
            _: &str,
        ) -> Result<MessageId> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(MessageId(format!("srv-{n}")))
        }
        async fn upload_file(
            &self,
            _: Vec<u8>,
            _: &str,
            _: &str,
            _: ChannelId,
        ) -> Result<atrium_shared::protocol::FileAttachment> {
            Err(CoreError::Transport("uploads unsupported in test".into()))
        }
    }

    /// Campaign fake that can be scripted to fail.
    struct ScriptedCampaigns {
        fail: bool,
    }

    #[async_trait]
    impl CampaignService for ScriptedCampaigns {
        async fn create_campaign(
            &self,
            _: &str,
            _: &str,
            _: u64,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<String> {
            if self.fail {
                Err(CoreError::Transport("campaign service down".into()))
            } else {
                Ok("camp-1".into())
            }
        }
        async fn create_deliverable(&self, _: &str, _: &str, _: &str, _: &str) -> Result<String> {
            Ok("del-1".into())
        }
    }

    struct RecordingWallet {
        debits: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait]
    impl WalletService for RecordingWallet {
        async fn debit(&self, client: &str, amount: u64, _: &str, _: &str, _: &str) -> Result<()> {
            self.debits.lock().unwrap().push((client.into(), amount));
            Ok(())
        }
    }

    fn generator(
        fail_campaign: bool,
    ) -> (
        SystemMessageGenerator,
        Arc<Mutex<CoreState>>,
        Arc<RecordingWallet>,
        mpsc::Receiver<CoreNotification>,
    ) {
        let state = Arc::new(Mutex::new(CoreState::new()));
        let wallet = Arc::new(RecordingWallet {
            debits: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(32);
        let sysgen = SystemMessageGenerator::new(
            Arc::clone(&state),
            Arc::new(OkTransport::new()),
            Arc::new(ScriptedCampaigns {
                fail: fail_campaign,
            }),
            wallet.clone() as Arc<dyn WalletService>,
            tx,
            SystemConfig {
                delivered_delay: Duration::from_millis(1),
                deliverable_price: HashMap::from([("reel".to_string(), 120)]),
            },
        );
        (sysgen, state, wallet, rx)
    }

    fn boost_event(channel: ChannelId) -> BoostSubmitted {
        BoostSubmitted {
            workspace_id: WorkspaceId::new(),
            channel_id: channel,
            client_id: "client-7".into(),
            platform: "facebook".into(),
            budget: 50,
            duration: "7d".into(),
            goal: "reach".into(),
            audience: "25-45".into(),
        }
    }

    #[tokio::test]
    async fn boost_announcement_reflects_inputs_verbatim() {
        let (sysgen, state, wallet, _rx) = generator(false);
        let channel = ChannelId::new();
        let message = sysgen.boost_submitted(boost_event(channel));

        assert!(message.is_system);
        assert_eq!(message.status, DeliveryStatus::Sending);
        assert!(message.content.contains("facebook"));
        assert!(message.content.contains("50"));
        assert!(message.content.contains("7d"));
        match message.tag {
            Some(SystemTag::Boost(ref tag)) => {
                assert_eq!(tag.status, BoostStatus::Requested);
                assert_eq!(tag.platform, "facebook");
                assert_eq!(tag.budget, 50);
            }
            other => panic!("expected boost tag, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Persisted through the normal path and debited.
        let state = state.lock().unwrap();
        let persisted = state.messages.get(&message.id).unwrap();
        assert!(!persisted.id.is_local());
        assert_eq!(wallet.debits.lock().unwrap().as_slice(), &[("client-7".into(), 50)]);
    }

    #[tokio::test]
    async fn failed_campaign_call_keeps_the_announcement() {
        let (sysgen, state, wallet, mut rx) = generator(true);
        let channel = ChannelId::new();
        let message = sysgen.boost_submitted(boost_event(channel));

        // The failure arrives as a notification, not a rollback.  Send
        // confirmations may interleave ahead of it.
        let action = loop {
            match rx.recv().await.unwrap() {
                CoreNotification::SystemActionFailed { action, .. } => break action,
                _ => continue,
            }
        };
        assert_eq!(action, "campaign-create");

        let state = state.lock().unwrap();
        let kept = state.messages.get(&message.id).unwrap();
        match kept.tag {
            Some(SystemTag::Boost(ref tag)) => assert_eq!(tag.status, BoostStatus::Requested),
            _ => panic!("tag lost"),
        }
        assert!(wallet.debits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deliverable_request_announces_and_debits_priced_kinds() {
        let (sysgen, state, wallet, _rx) = generator(false);
        let channel = ChannelId::new();
        let message = sysgen.deliverable_requested(DeliverableRequested {
            workspace_id: WorkspaceId::new(),
            channel_id: channel,
            client_id: "client-7".into(),
            title: "August promo reel".into(),
            kind: "reel".into(),
        });

        assert!(message.content.contains("August promo reel"));
        match message.tag {
            Some(SystemTag::Deliverable(ref tag)) => {
                assert_eq!(tag.status, DeliverableStatus::Pending);
                assert_eq!(tag.deliverable_kind, "reel");
            }
            other => panic!("expected deliverable tag, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            wallet.debits.lock().unwrap().as_slice(),
            &[("client-7".into(), 120)]
        );
        assert_eq!(
            state.lock().unwrap().messages.channel_messages(channel).len(),
            1
        );
    }

    #[tokio::test]
    async fn unpriced_deliverable_kind_skips_the_debit() {
        let (sysgen, _state, wallet, _rx) = generator(false);
        sysgen.deliverable_requested(DeliverableRequested {
            workspace_id: WorkspaceId::new(),
            channel_id: ChannelId::new(),
            client_id: "client-7".into(),
            title: "Monthly report".into(),
            kind: "report".into(),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(wallet.debits.lock().unwrap().is_empty());
    }
}
