//! Channel repository trait definition.

use chanops_types::channel::{Channel, ChannelFilter};
use chanops_types::error::RepositoryError;

/// Trait for reading and mutating rows of the `channels` table.
///
/// Every write is a single statement; callers never get a transaction
/// spanning several calls.
pub trait ChannelRepository: Send + Sync {
    /// List channels matching the filter, ordered by id.
    fn list(
        &self,
        filter: &ChannelFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Channel>, RepositoryError>> + Send;

    /// Total number of rows.
    fn count(&self) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Find a channel with the same name, or the same id when `id > 0`.
    fn find_existing(
        &self,
        name: &str,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Channel>, RepositoryError>> + Send;

    /// Insert a channel and return its id. With `keep_id` the channel's own id
    /// is written; otherwise the database assigns one.
    fn insert(
        &self,
        channel: &Channel,
        keep_id: bool,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Overwrite every column of the row with `channel.id`.
    fn update(
        &self,
        channel: &Channel,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every row, returning how many were removed.
    fn delete_all(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Replace a channel's key blob, optionally changing its status too.
    fn update_key(
        &self,
        id: i64,
        key: &str,
        status: Option<i64>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace a channel's comma-separated model list.
    fn update_models(
        &self,
        id: i64,
        models: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
