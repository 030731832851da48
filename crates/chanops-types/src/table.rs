//! Database table metadata used by the cleaner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much damage emptying a table does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Importance {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Importance::Critical => write!(f, "CRITICAL"),
            Importance::High => write!(f, "HIGH"),
            Importance::Medium => write!(f, "MEDIUM"),
            Importance::Low => write!(f, "LOW"),
            Importance::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Functional grouping of tables. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableCategory {
    Core,
    Business,
    System,
    Logs,
    Unknown,
}

impl TableCategory {
    pub const ALL: [TableCategory; 5] = [
        TableCategory::Core,
        TableCategory::Business,
        TableCategory::System,
        TableCategory::Logs,
        TableCategory::Unknown,
    ];

    pub fn title(self) -> &'static str {
        match self {
            TableCategory::Core => "Core data",
            TableCategory::Business => "Business data",
            TableCategory::System => "System configuration",
            TableCategory::Logs => "Logs and records",
            TableCategory::Unknown => "Other tables",
        }
    }
}

impl fmt::Display for TableCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableCategory::Core => write!(f, "core"),
            TableCategory::Business => write!(f, "business"),
            TableCategory::System => write!(f, "system"),
            TableCategory::Logs => write!(f, "logs"),
            TableCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Catalog entry describing a known gateway table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub function: &'static str,
    pub importance: Importance,
    pub category: TableCategory,
    pub impact: &'static str,
    pub fields: &'static [&'static str],
}

/// Row count of one live table joined with its catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub name: String,
    pub rows: i64,
    pub importance: Importance,
    pub category: TableCategory,
    pub description: String,
}

/// Column metadata needed to render a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Backend type name as reported by the catalog (`bigint`, `varchar`, ...).
    pub data_type: String,
}

impl ColumnInfo {
    /// Numeric columns are written unquoted in SQL dumps.
    pub fn is_numeric(&self) -> bool {
        let ty = self.data_type.to_ascii_lowercase();
        [
            "int", "integer", "tinyint", "smallint", "mediumint", "bigint", "decimal", "numeric",
            "float", "double", "real", "double precision", "boolean", "bool",
        ]
        .iter()
        .any(|n| ty == *n || ty.starts_with(&format!("{n}(")) || ty.starts_with(&format!("{n} ")))
    }
}

/// A single cell read back for a dump. Values are fetched as text so any
/// column type can be dumped.
pub type SqlValue = Option<String>;

/// Full content of a table, ready to be rendered as SQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDump {
    pub table: String,
    /// `CREATE TABLE` statement when the backend exposes one.
    pub create_statement: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Per-table result of a clean run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOutcome {
    pub table: String,
    pub success: bool,
    pub rows_removed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_is_display_order() {
        let mut shuffled = vec![
            TableCategory::Logs,
            TableCategory::Unknown,
            TableCategory::Core,
            TableCategory::System,
            TableCategory::Business,
        ];
        shuffled.sort();
        assert_eq!(shuffled, TableCategory::ALL.to_vec());
    }

    #[test]
    fn test_numeric_column_detection() {
        let col = |t: &str| ColumnInfo {
            name: "c".to_string(),
            data_type: t.to_string(),
        };
        assert!(col("bigint").is_numeric());
        assert!(col("INTEGER").is_numeric());
        assert!(col("decimal(10,2)").is_numeric());
        assert!(col("double precision").is_numeric());
        assert!(!col("varchar(255)").is_numeric());
        assert!(!col("longtext").is_numeric());
        assert!(!col("datetime").is_numeric());
        assert!(!col("").is_numeric());
    }

    #[test]
    fn test_importance_display() {
        assert_eq!(Importance::Critical.to_string(), "CRITICAL");
        assert_eq!(TableCategory::Logs.to_string(), "logs");
    }
}
