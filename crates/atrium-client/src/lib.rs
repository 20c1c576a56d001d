//! # atrium-client
//!
//! The session facade over the messaging core: one [`Session`] per signed-in
//! actor, exposing the optimistic-then-async command surface (send, edit,
//! react, pin, forward, boost/deliverable intake) plus the channel and
//! workspace passthroughs.  Background outcomes arrive on the
//! [`CoreNotification`] channel returned by [`Session::connect`].

pub mod config;
pub mod session;

pub use atrium_sync::CoreNotification;
pub use config::SessionConfig;
pub use session::{Session, SessionServices};
