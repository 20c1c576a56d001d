//! # atrium-sync
//!
//! The bridge between the in-memory core state and the external
//! collaborator services: typed service traits (persistence transport,
//! change feed, campaign/deliverable, wallet, identity), the per-channel
//! feed adapter that folds authoritative events back into the store, the
//! asynchronous send pipeline, and the system message generator for
//! cross-domain business actions.

pub mod adapter;
pub mod notify;
pub mod sender;
pub mod services;
pub mod system;

pub use adapter::FeedAdapter;
pub use notify::CoreNotification;
pub use services::{
    CampaignService, ChangeFeed, FeedSubscription, IdentityProvider, Transport, WalletService,
};
pub use system::{BoostSubmitted, DeliverableRequested, SystemConfig, SystemMessageGenerator};
