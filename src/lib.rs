//! extsync - cached external modules for deployments
//!
//! Computes a content identity for each external module, places the
//! module once per identity under a shared cache on every target machine,
//! and links it into the release.

pub mod archive;
pub mod channel;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod deploy;
pub mod error;
pub mod identity;
pub mod journal;
pub mod manifest;
pub mod strategy;
pub mod ui;

pub use coordinator::{SyncCoordinator, SyncReport, SyncSettings};
pub use error::{ExtsyncError, ExtsyncResult};
pub use identity::{identify, ContentIdentity};
