//! Shared domain types for chanops.
//!
//! Channels, backup documents, probe results, table catalog entries,
//! configuration and the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod backup;
pub mod channel;
pub mod config;
pub mod error;
pub mod probe;
pub mod table;
pub mod time;
