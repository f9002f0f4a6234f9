//! Storage gateway for generated assets.
//!
//! This crate provides:
//! - The [`StorageGateway`] trait the pipeline writes through
//! - A local-filesystem implementation serving files under `/static`

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStorage, StorageGateway};
