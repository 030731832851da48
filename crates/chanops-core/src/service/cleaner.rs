//! Table statistics and selective table cleaning.
//!
//! Cleaning empties whole tables. Before a non-empty table is emptied its
//! rows are dumped as SQL into a per-run directory under the backup dir; a
//! table whose backup fails is left untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::Instrument;

use chanops_types::error::CleanError;
use chanops_types::table::{CleanOutcome, Importance, TableCategory, TableStats};
use chanops_types::time::{display_timestamp, file_timestamp};

use crate::catalog::{self, BUSINESS_TABLES, LOG_TABLES};
use crate::export::sql::render_table_dump;
use crate::repository::table::TableAdmin;
use crate::service::fs::FileSystem;

/// Threshold above which a table counts as large in `db stats`.
pub const LARGE_TABLE_ROWS: i64 = 10_000;

/// Which tables a clean run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanSelection {
    All,
    Logs,
    Business,
    Tables(Vec<String>),
}

impl CleanSelection {
    /// Split the selection into tables that exist and names that don't.
    /// Presets silently skip tables this database doesn't have.
    pub fn resolve(&self, existing: &[String]) -> (Vec<String>, Vec<String>) {
        let wanted: Vec<String> = match self {
            CleanSelection::All => return (existing.to_vec(), Vec::new()),
            CleanSelection::Logs => LOG_TABLES.iter().map(|t| t.to_string()).collect(),
            CleanSelection::Business => BUSINESS_TABLES.iter().map(|t| t.to_string()).collect(),
            CleanSelection::Tables(tables) => tables.clone(),
        };
        let mut selected = Vec::new();
        let mut missing = Vec::new();
        for table in wanted {
            if selected.contains(&table) || missing.contains(&table) {
                continue;
            }
            if existing.contains(&table) {
                selected.push(table);
            } else {
                missing.push(table);
            }
        }
        if !matches!(self, CleanSelection::Tables(_)) {
            missing.clear();
        }
        (selected, missing)
    }
}

/// Whether the user must type the confirmation word instead of y/N.
pub fn requires_typed_confirmation(tables: &[String]) -> bool {
    tables
        .iter()
        .any(|t| catalog::importance_of(t) == Importance::Critical)
}

/// Follow-up notes for the tables that were actually emptied.
pub fn post_clean_notes(outcomes: &[CleanOutcome]) -> Vec<(String, &'static str)> {
    outcomes
        .iter()
        .filter(|o| o.success)
        .filter_map(|o| catalog::post_clean_note(&o.table).map(|note| (o.table.clone(), note)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: TableCategory,
    pub tables: usize,
    pub rows: i64,
}

/// Aggregates shown by `db stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub total_tables: usize,
    pub total_records: i64,
    pub empty_tables: usize,
    /// First few empty tables, in listing order.
    pub empty_sample: Vec<String>,
    /// Largest tables over [`LARGE_TABLE_ROWS`], biggest first.
    pub large_tables: Vec<TableStats>,
    pub categories: Vec<CategoryTotal>,
}

impl DatabaseStats {
    pub fn from_tables(tables: &[TableStats]) -> Self {
        let empty: Vec<&TableStats> = tables.iter().filter(|t| t.rows == 0).collect();

        let mut large: Vec<TableStats> = tables
            .iter()
            .filter(|t| t.rows > LARGE_TABLE_ROWS)
            .cloned()
            .collect();
        large.sort_by(|a, b| b.rows.cmp(&a.rows));
        large.truncate(5);

        let mut by_category: BTreeMap<TableCategory, (usize, i64)> = BTreeMap::new();
        for table in tables {
            let entry = by_category.entry(table.category).or_default();
            entry.0 += 1;
            entry.1 += table.rows;
        }

        Self {
            total_tables: tables.len(),
            total_records: tables.iter().map(|t| t.rows).sum(),
            empty_tables: empty.len(),
            empty_sample: empty.iter().take(5).map(|t| t.name.clone()).collect(),
            large_tables: large,
            categories: by_category
                .into_iter()
                .map(|(category, (tables, rows))| CategoryTotal {
                    category,
                    tables,
                    rows,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Directory holding this run's SQL dumps, when backups were enabled.
    pub backup_dir: Option<PathBuf>,
    pub outcomes: Vec<CleanOutcome>,
}

impl CleanReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn rows_removed(&self) -> i64 {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.rows_removed)
            .sum()
    }
}

pub struct CleanerService<T: TableAdmin, F: FileSystem> {
    admin: T,
    fs: F,
    backup_dir: PathBuf,
}

impl<T: TableAdmin, F: FileSystem> CleanerService<T, F> {
    pub fn new(admin: T, fs: F, backup_dir: PathBuf) -> Self {
        Self {
            admin,
            fs,
            backup_dir,
        }
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, CleanError> {
        Ok(self.admin.list_tables().await?)
    }

    /// Row counts of every table joined with the catalog, sorted by
    /// category then name. A count that fails is logged and shown as 0.
    pub async fn table_stats(&self) -> Result<Vec<TableStats>, CleanError> {
        let mut stats = Vec::new();
        for name in self.admin.list_tables().await? {
            let rows = match self.admin.count_rows(&name).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(table = %name, error = %e, "failed to count rows");
                    0
                }
            };
            let info = catalog::lookup(&name);
            stats.push(TableStats {
                rows,
                importance: catalog::importance_of(&name),
                category: catalog::category_of(&name),
                description: info.map_or_else(String::new, |i| i.description.to_string()),
                name,
            });
        }
        stats.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(stats)
    }

    pub async fn database_stats(&self) -> Result<DatabaseStats, CleanError> {
        Ok(DatabaseStats::from_tables(&self.table_stats().await?))
    }

    /// Empty each table in order, dumping non-empty ones first when `backup`
    /// is set. Failures are recorded per table; the run continues.
    pub async fn clean(&self, tables: &[String], backup: bool) -> Result<CleanReport, CleanError> {
        let ts = file_timestamp();
        let run_dir = self.backup_dir.join(format!("clean_{ts}"));
        if backup {
            self.fs
                .create_dir_all(&run_dir)
                .await
                .map_err(|e| CleanError::Io(format!("{}: {e}", run_dir.display())))?;
        }

        let mut outcomes = Vec::with_capacity(tables.len());
        for table in tables {
            let span = tracing::info_span!("clean_table", table = %table);
            let target = backup.then(|| run_dir.join(format!("{table}_{ts}.sql")));
            outcomes.push(self.clean_table(table, target).instrument(span).await);
        }

        Ok(CleanReport {
            backup_dir: backup.then_some(run_dir),
            outcomes,
        })
    }

    /// Back up (when `backup_path` is set and the table has rows) then empty
    /// one table. A table whose size is unknown is never emptied without a
    /// backup.
    async fn clean_table(&self, table: &str, backup_path: Option<PathBuf>) -> CleanOutcome {
        let mut outcome = CleanOutcome {
            table: table.to_string(),
            success: false,
            rows_removed: 0,
            backup_file: None,
            error: None,
        };

        let rows = match self.admin.count_rows(table).await {
            Ok(rows) => rows,
            Err(e) if backup_path.is_some() => {
                tracing::error!(error = %e, "failed to count rows, table left untouched");
                outcome.error = Some(format!("count failed: {e}"));
                return outcome;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to count rows before clean");
                0
            }
        };

        if let Some(path) = backup_path.filter(|_| rows > 0) {
            if let Err(e) = self.backup_table(table, &path).await {
                tracing::error!(error = %e, "backup failed, table left untouched");
                outcome.error = Some(format!("backup failed: {e}"));
                return outcome;
            }
            outcome.backup_file = Some(path.display().to_string());
        }

        match self.admin.truncate(table).await {
            Ok(()) => {
                tracing::info!(rows, "table emptied");
                outcome.success = true;
                outcome.rows_removed = rows;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to empty table");
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    async fn backup_table(&self, table: &str, path: &Path) -> Result<(), CleanError> {
        let dump = self.admin.dump_table(table).await?;
        let sql = render_table_dump(&dump, self.admin.identifier_quote(), &display_timestamp());
        self.fs
            .write_file(path, &sql)
            .await
            .map_err(|e| CleanError::Io(format!("{}: {e}", path.display())))
    }
}
