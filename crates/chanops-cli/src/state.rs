//! Application state wiring all services together.
//!
//! Services are generic over repository/filesystem/prober traits; AppState
//! pins them to the SQL, local-disk and Gemini implementations.

use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use chanops_core::probe::runner::BatchTester;
use chanops_core::service::channel::ChannelService;
use chanops_core::service::cleaner::CleanerService;
use chanops_core::service::keys::KeyService;
use chanops_core::service::models::ModelService;
use chanops_infra::filesystem::LocalFileSystem;
use chanops_infra::gemini::GeminiKeyProbe;
use chanops_infra::sql::channel::SqlChannelRepository;
use chanops_infra::sql::pool::DatabasePool;
use chanops_infra::sql::table::SqlTableAdmin;
use chanops_types::channel::ChannelFilter;
use chanops_types::config::ChanopsConfig;

pub type ConcreteChannelService = ChannelService<SqlChannelRepository, LocalFileSystem>;

pub type ConcreteKeyService = KeyService<SqlChannelRepository, LocalFileSystem>;

pub type ConcreteModelService = ModelService<SqlChannelRepository>;

pub type ConcreteCleanerService = CleanerService<SqlTableAdmin, LocalFileSystem>;

/// Shared state handed to every command handler.
pub struct AppState {
    pub config: ChanopsConfig,
    pub db_pool: DatabasePool,
    pub channel_service: Arc<ConcreteChannelService>,
    pub key_service: Arc<ConcreteKeyService>,
    pub model_service: Arc<ConcreteModelService>,
    pub cleaner_service: Arc<ConcreteCleanerService>,
}

impl AppState {
    /// Connect to the database and wire the services.
    pub async fn init(config: ChanopsConfig, dsn: &SecretString) -> anyhow::Result<Self> {
        let max_connections = u32::try_from(config.tester.workers).unwrap_or(u32::MAX).saturating_add(1);
        let db_pool = DatabasePool::connect(dsn, max_connections)
            .await
            .context("failed to connect to the database")?;
        tracing::info!(backend = %db_pool.backend, "database ready");

        let fs = LocalFileSystem::new();
        let backup_dir = config.backup.dir.clone();

        let channel_service = ChannelService::new(
            SqlChannelRepository::new(db_pool.clone()),
            fs,
            backup_dir.clone(),
        );
        let key_service = KeyService::new(SqlChannelRepository::new(db_pool.clone()), fs);
        let model_service = ModelService::new(SqlChannelRepository::new(db_pool.clone()));
        let cleaner_service = CleanerService::new(SqlTableAdmin::new(db_pool.clone()), fs, backup_dir);

        Ok(Self {
            config,
            db_pool,
            channel_service: Arc::new(channel_service),
            key_service: Arc::new(key_service),
            model_service: Arc::new(model_service),
            cleaner_service: Arc::new(cleaner_service),
        })
    }

    /// Gemini prober configured from `[tester]`.
    pub fn probe(&self) -> anyhow::Result<GeminiKeyProbe> {
        let tester = &self.config.tester;
        let mut probe = GeminiKeyProbe::new(tester.timeout_secs).context("failed to build HTTP client")?;
        if let Some(base_url) = tester.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            probe = probe.with_base_url(base_url);
        }
        Ok(probe)
    }

    /// Batch tester over [`Self::probe`].
    pub fn tester(&self, workers: Option<usize>) -> anyhow::Result<BatchTester<GeminiKeyProbe>> {
        Ok(BatchTester::new(
            self.probe()?,
            workers.unwrap_or(self.config.tester.workers),
            self.config.tester.model.clone(),
        ))
    }

    /// Filter for the given types, or the configured Gemini types when none
    /// are given.
    pub fn gemini_filter(&self, types: &[i64], status: Option<i64>) -> ChannelFilter {
        ChannelFilter {
            id: None,
            types: self.gemini_types(types),
            status,
        }
    }

    pub fn gemini_types(&self, types: &[i64]) -> Vec<i64> {
        if types.is_empty() {
            self.config.tester.gemini_types.clone()
        } else {
            types.to_vec()
        }
    }

    pub async fn close(&self) {
        self.db_pool.close().await;
    }
}
