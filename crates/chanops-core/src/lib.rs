//! Business logic and port definitions for chanops.
//!
//! This crate defines the repository, filesystem and probe traits that the
//! infrastructure layer implements, the services that orchestrate them, and
//! the renderers for every file format the tool writes. It depends only on
//! `chanops-types` -- never on `chanops-infra` or any database/HTTP crate.

pub mod catalog;
pub mod export;
pub mod probe;
pub mod repository;
pub mod service;

#[cfg(test)]
mod testing;
