//! Table administration trait used by the cleaner.

use chanops_types::error::RepositoryError;
use chanops_types::table::TableDump;

/// Generic access to whole tables: enumerate, count, dump and empty them.
pub trait TableAdmin: Send + Sync {
    /// Names of all base tables in the current database/schema.
    fn list_tables(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    fn count_rows(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Read a table's DDL, columns and every row as text.
    fn dump_table(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<TableDump, RepositoryError>> + Send;

    /// Remove every row of the table.
    fn truncate(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Character used to quote identifiers in generated SQL.
    fn identifier_quote(&self) -> char;
}
