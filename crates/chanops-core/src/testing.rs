//! In-memory implementations of the ports, shared by the service tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use chanops_types::channel::{Channel, ChannelFilter};
use chanops_types::error::RepositoryError;
use chanops_types::probe::{ProbeOutcome, ProbeResult};
use chanops_types::table::TableDump;

use crate::probe::KeyProbe;
use crate::repository::channel::ChannelRepository;
use crate::repository::table::TableAdmin;
use crate::service::fs::{FileEntry, FileSystem};

/// Probe that accepts a fixed set of keys and rejects everything else with 400.
pub struct ScriptedProbe {
    valid: HashSet<String>,
    overrides: HashMap<String, ProbeResult>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProbe {
    pub fn valid_keys(keys: &[&str]) -> Self {
        Self {
            valid: keys.iter().map(|k| k.to_string()).collect(),
            overrides: HashMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_result(mut self, key: &str, result: ProbeResult) -> Self {
        self.overrides.insert(key.to_string(), result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl KeyProbe for ScriptedProbe {
    async fn probe(&self, key: &str, _model: &str, _base_url: Option<&str>) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(result) = self.overrides.get(key) {
            return result.clone();
        }
        if self.valid.contains(key) {
            ProbeResult::valid(100)
        } else {
            ProbeResult::failed(ProbeOutcome::BadRequest, "Invalid API key (400 Bad Request)", 50)
        }
    }
}

/// Channel table held in a `Vec`, with optional injected insert failures.
pub struct MemoryChannelRepository {
    channels: Mutex<Vec<Channel>>,
    next_id: AtomicI64,
    failing_names: HashSet<String>,
}

impl MemoryChannelRepository {
    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let next_id = channels.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            channels: Mutex::new(channels),
            next_id: AtomicI64::new(next_id),
            failing_names: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_names.insert(name.to_string());
        self
    }

    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels.lock().unwrap().clone()
    }
}

impl ChannelRepository for MemoryChannelRepository {
    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, RepositoryError> {
        let mut channels: Vec<Channel> = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.channels.lock().unwrap().len() as i64)
    }

    async fn find_existing(&self, name: &str, id: i64) -> Result<Option<Channel>, RepositoryError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name || (id > 0 && c.id == id))
            .cloned())
    }

    async fn insert(&self, channel: &Channel, keep_id: bool) -> Result<i64, RepositoryError> {
        if self.failing_names.contains(&channel.name) {
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        let mut channels = self.channels.lock().unwrap();
        let mut row = channel.clone();
        if keep_id {
            if channels.iter().any(|c| c.id == row.id) {
                return Err(RepositoryError::Conflict(format!("duplicate id {}", row.id)));
            }
            self.next_id.fetch_max(row.id + 1, Ordering::SeqCst);
        } else {
            row.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }
        let id = row.id;
        channels.push(row);
        Ok(id)
    }

    async fn update(&self, channel: &Channel) -> Result<(), RepositoryError> {
        if self.failing_names.contains(&channel.name) {
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        let mut channels = self.channels.lock().unwrap();
        let row = channels
            .iter_mut()
            .find(|c| c.id == channel.id)
            .ok_or(RepositoryError::NotFound)?;
        *row = channel.clone();
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let mut channels = self.channels.lock().unwrap();
        let removed = channels.len() as u64;
        channels.clear();
        Ok(removed)
    }

    async fn update_key(&self, id: i64, key: &str, status: Option<i64>) -> Result<(), RepositoryError> {
        let mut channels = self.channels.lock().unwrap();
        let row = channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.key = key.to_string();
        if let Some(status) = status {
            row.status = status;
        }
        Ok(())
    }

    async fn update_models(&self, id: i64, models: &str) -> Result<(), RepositoryError> {
        let mut channels = self.channels.lock().unwrap();
        let row = channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.models = models.to_string();
        Ok(())
    }
}

/// Filesystem backed by a map of paths to contents.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    read_only: bool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
        self
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn content(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

impl FileSystem for MemoryFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        if self.read_only {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        self.content(path)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<(), std::io::Error> {
        if self.read_only {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"));
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, std::io::Error> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, content)| FileEntry {
                path: p.clone(),
                size: content.len() as u64,
                modified: None,
            })
            .collect())
    }
}

/// Tables held as dumps; truncation clears the rows.
#[derive(Default)]
pub struct MemoryTableAdmin {
    tables: Mutex<BTreeMap<String, TableDump>>,
    failing_truncate: HashSet<String>,
    failing_count: HashSet<String>,
}

impl MemoryTableAdmin {
    pub fn with_table(self, dump: TableDump) -> Self {
        self.tables.lock().unwrap().insert(dump.table.clone(), dump);
        self
    }

    pub fn failing_truncate(mut self, table: &str) -> Self {
        self.failing_truncate.insert(table.to_string());
        self
    }

    pub fn failing_count(mut self, table: &str) -> Self {
        self.failing_count.insert(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, |d| d.rows.len())
    }
}

impl TableAdmin for MemoryTableAdmin {
    async fn list_tables(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.tables.lock().unwrap().keys().cloned().collect())
    }

    async fn count_rows(&self, table: &str) -> Result<i64, RepositoryError> {
        if self.failing_count.contains(table) {
            return Err(RepositoryError::Query(format!("cannot count {table}")));
        }
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|d| d.rows.len() as i64)
            .ok_or(RepositoryError::NotFound)
    }

    async fn dump_table(&self, table: &str) -> Result<TableDump, RepositoryError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn truncate(&self, table: &str) -> Result<(), RepositoryError> {
        if self.failing_truncate.contains(table) {
            return Err(RepositoryError::Query(format!("cannot truncate {table}")));
        }
        let mut tables = self.tables.lock().unwrap();
        let dump = tables.get_mut(table).ok_or(RepositoryError::NotFound)?;
        dump.rows.clear();
        Ok(())
    }

    fn identifier_quote(&self) -> char {
        '`'
    }
}
