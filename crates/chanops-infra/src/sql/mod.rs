//! SQL storage layer.
//!
//! Repository implementations for MySQL, PostgreSQL and SQLite, all reached
//! through one sqlx `AnyPool`. Backend differences live in [`dialect`].

pub mod channel;
pub mod dialect;
pub mod dsn;
pub mod pool;
pub mod table;
