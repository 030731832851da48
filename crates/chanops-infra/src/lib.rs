//! Infrastructure layer for chanops.
//!
//! Implements the ports defined in `chanops-core`: SQL repositories over
//! MySQL/PostgreSQL/SQLite, the Gemini key prober, the local filesystem
//! adapter, plus config loading and subprocess helpers.

pub mod config;
pub mod filesystem;
pub mod gemini;
pub mod process;
pub mod sql;
