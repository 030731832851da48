//! SQL implementation of `TableAdmin`.

use sqlx::Row;

use chanops_core::repository::table::TableAdmin;
use chanops_types::error::RepositoryError;
use chanops_types::table::{ColumnInfo, SqlValue, TableDump};

use super::dialect::{Backend, ValueKind};
use super::pool::{DatabasePool, query_error};

/// Columns of `table` in declaration order. Empty if the table doesn't exist.
pub async fn list_columns(pool: &DatabasePool, table: &str) -> Result<Vec<ColumnInfo>, RepositoryError> {
    let rows = sqlx::query(pool.backend.list_columns_sql())
        .bind(table.to_string())
        .fetch_all(&pool.pool)
        .await
        .map_err(query_error)?;
    rows.iter()
        .map(|row| {
            Ok(ColumnInfo {
                name: row.try_get::<String, _>(0).map_err(query_error)?,
                data_type: row
                    .try_get::<Option<String>, _>(1)
                    .map_err(query_error)?
                    .unwrap_or_default(),
            })
        })
        .collect()
}

pub struct SqlTableAdmin {
    pool: DatabasePool,
}

impl SqlTableAdmin {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn create_statement(&self, table: &str) -> Option<String> {
        let backend = self.pool.backend;
        let result = match backend {
            Backend::MySql => {
                let sql = format!("SHOW CREATE TABLE {}", backend.quote(table));
                sqlx::query(&sql)
                    .fetch_one(&self.pool.pool)
                    .await
                    .and_then(|row| row.try_get::<String, _>(1))
            }
            Backend::Sqlite => sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table.to_string())
                .fetch_one(&self.pool.pool)
                .await
                .and_then(|row| row.try_get::<String, _>(0)),
            Backend::Postgres => return None,
        };
        match result {
            Ok(ddl) => Some(ddl),
            Err(e) => {
                tracing::warn!(table, error = %e, "could not read table definition");
                None
            }
        }
    }
}

impl TableAdmin for SqlTableAdmin {
    async fn list_tables(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(self.pool.backend.list_tables_sql())
            .fetch_all(&self.pool.pool)
            .await
            .map_err(query_error)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(query_error))
            .collect()
    }

    async fn count_rows(&self, table: &str) -> Result<i64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.pool.backend.quote(table));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool.pool)
            .await
            .map_err(query_error)?;
        row.try_get::<i64, _>(0).map_err(query_error)
    }

    async fn dump_table(&self, table: &str) -> Result<TableDump, RepositoryError> {
        let backend = self.pool.backend;
        let columns = list_columns(&self.pool, table).await?;
        if columns.is_empty() {
            return Err(RepositoryError::NotFound);
        }

        let select: Vec<String> = columns
            .iter()
            .map(|c| backend.cast(&backend.quote(&c.name), ValueKind::Text))
            .collect();
        let sql = format!("SELECT {} FROM {}", select.join(", "), backend.quote(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.pool)
            .await
            .map_err(query_error)?;

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let cells = (0..columns.len())
                .map(|i| row.try_get::<SqlValue, _>(i).map_err(query_error))
                .collect::<Result<Vec<_>, _>>()?;
            values.push(cells);
        }

        Ok(TableDump {
            table: table.to_string(),
            create_statement: self.create_statement(table).await,
            columns,
            rows: values,
        })
    }

    async fn truncate(&self, table: &str) -> Result<(), RepositoryError> {
        sqlx::query(&self.pool.backend.truncate_sql(table))
            .execute(&self.pool.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    fn identifier_quote(&self) -> char {
        self.pool.backend.identifier_quote()
    }
}
