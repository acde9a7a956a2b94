//! ff-core: shared types, IDs, errors, configuration, and the event bus.
//!
//! Every other ff-* crate depends on this one. It carries the unified
//! [`Error`] taxonomy, the job identifier, the media category model with its
//! static extension-to-MIME table, application configuration, and a
//! broadcast event bus for job lifecycle notifications.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
