//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (chanops-infra) implements against MySQL, PostgreSQL or SQLite.

pub mod channel;
pub mod table;
