//! Plexus resource graph engine: authoritative store, link derivation and
//! incremental link maintenance.
//!
//! Everything here is synchronous and in-memory. The single-writer discipline
//! is owned by `plexus-sync`; this crate never locks.

#![forbid(unsafe_code)]

pub mod classify;
pub mod derive;
pub mod maintain;
pub mod store;

pub use classify::{classify, merge_partial, ChangeClass};
pub use maintain::{apply_event, Applied};
pub use store::{LinkSet, ResourceStore};
