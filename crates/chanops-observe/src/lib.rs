//! Logging and trace export for chanops.

pub mod conventions;
pub mod tracing_setup;
