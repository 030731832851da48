//! SQL differences between the supported backends.
//!
//! All queries go through the sqlx `Any` driver, which only decodes a small
//! set of portable types. Every value read back is therefore cast to an
//! integer, float or text type on the server side first.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    Postgres,
    Sqlite,
}

/// Portable value kinds the `Any` driver can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Text,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::MySql => write!(f, "MySQL"),
            Backend::Postgres => write!(f, "PostgreSQL"),
            Backend::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl Backend {
    pub fn identifier_quote(self) -> char {
        match self {
            Backend::MySql => '`',
            Backend::Postgres | Backend::Sqlite => '"',
        }
    }

    pub fn quote(self, ident: &str) -> String {
        let q = self.identifier_quote();
        let doubled: String = [q, q].iter().collect();
        format!("{q}{}{q}", ident.replace(q, &doubled))
    }

    /// Bind placeholder for the `n`th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Backend::Postgres => format!("${n}"),
            Backend::MySql | Backend::Sqlite => "?".to_string(),
        }
    }

    /// Whether `INSERT ... RETURNING` hands back the new row id. MySQL
    /// reports it through the affected-rows packet instead.
    pub fn supports_returning(self) -> bool {
        matches!(self, Backend::Postgres | Backend::Sqlite)
    }

    /// `expr` cast to a type of the given kind.
    pub fn cast(self, expr: &str, kind: ValueKind) -> String {
        let ty = match (self, kind) {
            (Backend::MySql, ValueKind::Int) => "SIGNED",
            (Backend::MySql, ValueKind::Float) => "DOUBLE",
            (Backend::MySql, ValueKind::Text) => "CHAR",
            (Backend::Postgres, ValueKind::Int) => "BIGINT",
            (Backend::Postgres, ValueKind::Float) => "DOUBLE PRECISION",
            (Backend::Sqlite, ValueKind::Int) => "INTEGER",
            (Backend::Sqlite, ValueKind::Float) => "REAL",
            (_, ValueKind::Text) => "TEXT",
        };
        format!("CAST({expr} AS {ty})")
    }

    /// Query returning the names of all base tables in the current schema.
    pub fn list_tables_sql(self) -> &'static str {
        match self {
            Backend::MySql => {
                "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
            }
            Backend::Postgres => {
                "SELECT CAST(tablename AS TEXT) FROM pg_tables \
                 WHERE schemaname = current_schema() ORDER BY tablename"
            }
            Backend::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        }
    }

    /// Query returning `(column_name, data_type)` for one table, in
    /// declaration order. Takes the table name as its only parameter.
    pub fn list_columns_sql(self) -> &'static str {
        match self {
            Backend::MySql => {
                "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR) FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION"
            }
            Backend::Postgres => {
                "SELECT CAST(column_name AS TEXT), CAST(data_type AS TEXT) FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position"
            }
            Backend::Sqlite => "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
        }
    }

    /// Statement that empties a table.
    pub fn truncate_sql(self, table: &str) -> String {
        match self {
            Backend::Sqlite => format!("DELETE FROM {}", self.quote(table)),
            Backend::MySql | Backend::Postgres => format!("TRUNCATE TABLE {}", self.quote(table)),
        }
    }
}
