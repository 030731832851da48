//! Gemini `generateContent` key prober.

pub mod client;
pub mod types;

pub use client::GeminiKeyProbe;
