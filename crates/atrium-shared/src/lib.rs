//! # atrium-shared
//!
//! Types shared by every Atrium crate: identifiers, actor/role model,
//! system tags, the error taxonomy, and the record/event shapes exchanged
//! with the persistence and change-feed services.

pub mod constants;
pub mod protocol;
pub mod tags;
pub mod types;

mod error;

pub use error::{CoreError, Result};
