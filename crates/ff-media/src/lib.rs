//! # ff-media
//!
//! Content classification and the media adapter registry.
//!
//! - [`classify`] sniffs magic bytes into a [`ff_core::FileType`].
//! - [`catalogue`] lists the follow-up conversions and operations offered
//!   for a classified file.
//! - [`adapters`] holds the [`MediaAdapter`] trait, the image, audio/video
//!   and document adapters, and the [`AdapterRegistry`] that picks one by
//!   MIME type.

pub mod adapters;
pub mod catalogue;
pub mod classify;

pub use adapters::{
    AdapterRegistry, MediaAdapter, MediaInput, MediaMetadata, Operation, ProcessingResult,
};
pub use catalogue::{manipulation_options, ConversionOption, ManipulationOptions, OperationOption};
pub use classify::classify;
