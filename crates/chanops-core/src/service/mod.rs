//! Business logic services (use cases).
//!
//! Services orchestrate repository calls, filesystem operations, and
//! business rules. They depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod channel;
pub mod cleaner;
pub mod fs;
pub mod keys;
pub mod models;
