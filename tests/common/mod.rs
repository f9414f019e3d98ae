#![allow(dead_code)]

//! Shared test harness: mock collaborators plus a per-unit reconciler.
//!
//! `MockFacade` mimics the application CLI's config store closely enough
//! for the trusted-domain bookkeeping to be observable; `MockWorkload`
//! records every privileged operation and keeps artifacts in memory.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use syncop::config::{CharmConfig, RuntimeTuning};
use syncop::error::{Error, Result};
use syncop::event::{Event, EventContext, MasterDescriptor, Outcome};
use syncop::facade::{AdminCredentials, AppFacade, FacadeStatus, TRUSTED_DOMAINS_KEY};
use syncop::relation::InMemoryRelation;
use syncop::state::{DatabaseConnection, LifecycleState, StateStore};
use syncop::status::UnitStatus;
use syncop::workload::Workload;
use syncop::Reconciler;
use tempfile::TempDir;

pub const MOCK_VERSION: &str = "28.0.1";

#[derive(Default)]
struct FacadeInner {
    installed: bool,
    install_calls: u32,
    maintenance: bool,
    lists: BTreeMap<String, BTreeMap<usize, String>>,
    calls: Vec<String>,
}

pub struct MockFacade {
    workload: Arc<MockWorkload>,
    artifact: PathBuf,
    fail_install: bool,
    inner: Mutex<FacadeInner>,
}

impl MockFacade {
    pub fn new(workload: Arc<MockWorkload>, artifact: PathBuf, fail_install: bool) -> Self {
        Self {
            workload,
            artifact,
            fail_install,
            inner: Mutex::new(FacadeInner::default()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.inner.lock().unwrap().calls.push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn install_calls(&self) -> u32 {
        self.inner.lock().unwrap().install_calls
    }

    pub fn trusted_domains(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .lists
            .get(TRUSTED_DOMAINS_KEY)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn maintenance(&self) -> bool {
        self.inner.lock().unwrap().maintenance
    }
}

#[async_trait]
impl AppFacade for MockFacade {
    async fn install(
        &self,
        _db: &DatabaseConnection,
        _admin: &AdminCredentials,
        _data_dir: &Path,
    ) -> Result<String> {
        self.record("install");
        let mut inner = self.inner.lock().unwrap();
        inner.install_calls += 1;
        if self.fail_install {
            return Err(Error::InstallFailed("simulated install failure".into()));
        }
        inner.installed = true;
        // A real install seeds localhost and writes the config artifact.
        inner
            .lists
            .entry(TRUSTED_DOMAINS_KEY.to_string())
            .or_default()
            .insert(0, "localhost".to_string());
        drop(inner);
        self.workload
            .seed_artifact(&self.artifact, "<?php /* rendered config */");
        Ok("installed".to_string())
    }

    async fn set_config_key(&self, key: &str, index: usize, value: &str) -> Result<()> {
        self.record(format!("config:set {} {} {}", key, index, value));
        self.inner
            .lock()
            .unwrap()
            .lists
            .entry(key.to_string())
            .or_default()
            .insert(index, value.to_string());
        Ok(())
    }

    async fn delete_config_keys(&self, key: &str) -> Result<()> {
        self.record(format!("config:delete {}", key));
        self.inner.lock().unwrap().lists.remove(key);
        Ok(())
    }

    async fn get_config_keys(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .lists
            .get(key)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_maintenance_mode(&self, enable: bool) -> Result<String> {
        self.record(format!("maintenance:mode {}", enable));
        self.inner.lock().unwrap().maintenance = enable;
        Ok(String::new())
    }

    async fn query_status(&self) -> Result<FacadeStatus> {
        let inner = self.inner.lock().unwrap();
        Ok(FacadeStatus {
            installed: inner.installed,
            version: MOCK_VERSION.to_string(),
            maintenance: inner.maintenance,
        })
    }

    async fn set_overwrite_protocol(&self, protocol: &str) -> Result<()> {
        self.record(format!("overwriteprotocol {}", protocol));
        Ok(())
    }

    async fn add_missing_indices(&self) -> Result<String> {
        self.record("db:add-missing-indices");
        Ok("Done.".to_string())
    }

    async fn convert_filecache_encoding(&self) -> Result<String> {
        self.record("db:convert-filecache");
        if !self.inner.lock().unwrap().maintenance {
            return Err(Error::Facade(
                "filecache conversion requires maintenance mode".into(),
            ));
        }
        Ok("All entries converted.".to_string())
    }

    async fn install_background_cron(&self) -> Result<String> {
        self.record("background:cron");
        Ok("Set mode for background jobs to 'cron'".to_string())
    }
}

#[derive(Default)]
pub struct MockWorkload {
    artifacts: Mutex<HashMap<PathBuf, String>>,
    ops: Mutex<Vec<String>>,
    status: Mutex<Option<UnitStatus>>,
}

impl MockWorkload {
    fn record(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }

    pub fn seed_artifact(&self, path: &Path, contents: &str) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
    }

    pub fn artifact(&self, path: &Path) -> Option<String> {
        self.artifacts.lock().unwrap().get(path).cloned()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn op_count(&self, prefix: &str) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.starts_with(prefix))
            .count()
    }

    pub fn last_status(&self) -> Option<UnitStatus> {
        self.status.lock().unwrap().clone()
    }
}

#[async_trait]
impl Workload for MockWorkload {
    async fn install_dependencies(&self) -> Result<()> {
        self.record("install_dependencies");
        Ok(())
    }

    async fn fetch_and_extract(&self, tarball_url: &str) -> Result<()> {
        self.record(format!("fetch_and_extract {}", tarball_url));
        Ok(())
    }

    async fn render_web_server_config(&self) -> Result<()> {
        self.record("render_web_server_config");
        Ok(())
    }

    async fn render_runtime_config(&self, _tuning: &RuntimeTuning) -> Result<()> {
        self.record("render_runtime_config");
        Ok(())
    }

    async fn restart_web_server(&self) -> Result<()> {
        self.record("restart_web_server");
        Ok(())
    }

    async fn open_public_port(&self, port: u16) -> Result<()> {
        self.record(format!("open_public_port {}", port));
        Ok(())
    }

    async fn fix_ownership(&self, path: &Path) -> Result<()> {
        self.record(format!("fix_ownership {}", path.display()));
        Ok(())
    }

    async fn start_data_mount(&self, data_dir: &Path) -> Result<()> {
        self.record(format!("start_data_mount {}", data_dir.display()));
        Ok(())
    }

    async fn read_artifact(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.artifacts.lock().unwrap().get(path).cloned())
    }

    async fn write_artifact(&self, path: &Path, contents: &str) -> Result<()> {
        self.record(format!("write_artifact {}", path.display()));
        self.artifacts
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn set_status(&self, status: &UnitStatus) {
        *self.status.lock().unwrap() = Some(status.clone());
    }
}

/// One simulated unit: mocks, a reconciler, and its own state file.
/// Peers created with [`Harness::peer`] share the relation buckets.
pub struct Harness {
    pub config: CharmConfig,
    pub facade: Arc<MockFacade>,
    pub workload: Arc<MockWorkload>,
    pub cluster: InMemoryRelation,
    pub database: InMemoryRelation,
    pub reconciler: Reconciler,
    store: StateStore,
    _dir: TempDir,
}

impl Harness {
    pub fn new(unit: &str) -> Self {
        let config = CharmConfig {
            fqdn: Some("files.example.org".to_string()),
            ..Default::default()
        };
        Self::build(
            config,
            InMemoryRelation::new(unit),
            InMemoryRelation::new(unit),
            false,
        )
    }

    pub fn with_failing_install(unit: &str) -> Self {
        let config = CharmConfig::default();
        Self::build(
            config,
            InMemoryRelation::new(unit),
            InMemoryRelation::new(unit),
            true,
        )
    }

    /// Another unit attached to the same cluster and database relations.
    pub fn peer(&self, unit: &str) -> Self {
        Self::build(
            self.config.clone(),
            self.cluster.view_as(unit),
            self.database.view_as(unit),
            false,
        )
    }

    fn build(
        config: CharmConfig,
        cluster: InMemoryRelation,
        database: InMemoryRelation,
        fail_install: bool,
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let workload = Arc::new(MockWorkload::default());
        let facade = Arc::new(MockFacade::new(
            Arc::clone(&workload),
            config.config_artifact(),
            fail_install,
        ));
        let store = StateStore::new(dir.path().join("state.json"));
        let reconciler = Reconciler::new(
            config.clone(),
            Arc::clone(&facade) as Arc<dyn AppFacade>,
            Arc::clone(&workload) as Arc<dyn Workload>,
            Arc::new(cluster.clone()),
            Arc::new(database.clone()),
            store.clone(),
        );
        Self {
            config,
            facade,
            workload,
            cluster,
            database,
            reconciler,
            store,
            _dir: dir,
        }
    }

    pub async fn dispatch(&self, event: Event, is_leader: bool) -> syncop::Result<Outcome> {
        self.reconciler
            .dispatch(event, EventContext { is_leader })
            .await
    }

    /// The state as the next dispatch would load it.
    pub fn state(&self) -> LifecycleState {
        self.store
            .load_or_init(&self.config.data_dir)
            .expect("state should load")
    }

    pub fn present_master(&self) -> MasterDescriptor {
        MasterDescriptor {
            host: "10.20.0.5".to_string(),
            port: 5432,
            user: "syncuser".to_string(),
            password: "hunter2".to_string(),
            dbname: self.config.database_name.clone(),
            kind: "pgsql".to_string(),
            is_present: true,
        }
    }
}
