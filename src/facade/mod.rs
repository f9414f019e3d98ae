//! The App Control Facade: the managed application's own CLI.
//!
//! Every call is synchronous from the reconciler's point of view, returns a
//! status/output pair, and is safe to retry except [`AppFacade::install`],
//! which must be called at most once per application instance. The
//! reconciler guards that with the `initialized` flag.

mod occ;

pub use occ::OccFacade;

use crate::error::Result;
use crate::state::DatabaseConnection;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

/// Key of the trusted-domain list inside the application's config store.
pub const TRUSTED_DOMAINS_KEY: &str = "trusted_domains";

/// Result of the facade's status query.
#[derive(Debug, Clone, Deserialize)]
pub struct FacadeStatus {
    pub installed: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub maintenance: bool,
}

/// Admin credentials handed to the one-shot install.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Control surface of the managed application.
#[async_trait]
pub trait AppFacade: Send + Sync {
    /// One-shot application install. At most once per application instance;
    /// a non-zero result is fatal with no automatic retry path.
    async fn install(
        &self,
        db: &DatabaseConnection,
        admin: &AdminCredentials,
        data_dir: &Path,
    ) -> Result<String>;

    async fn set_config_key(&self, key: &str, index: usize, value: &str) -> Result<()>;

    async fn delete_config_keys(&self, key: &str) -> Result<()>;

    /// Current values for a list-valued config key, in index order.
    async fn get_config_keys(&self, key: &str) -> Result<Vec<String>>;

    async fn set_maintenance_mode(&self, enable: bool) -> Result<String>;

    async fn query_status(&self) -> Result<FacadeStatus>;

    async fn set_overwrite_protocol(&self, protocol: &str) -> Result<()>;

    async fn add_missing_indices(&self) -> Result<String>;

    async fn convert_filecache_encoding(&self) -> Result<String>;

    /// Switch the application's periodic background jobs to cron.
    async fn install_background_cron(&self) -> Result<String>;
}

/// Run `op` with maintenance mode enabled, restoring the previous mode
/// afterwards regardless of whether `op` succeeded.
///
/// The future is not polled until maintenance is up, so passing a facade
/// call expression directly is safe. If both `op` and the restore fail, the
/// operation's error wins and the restore failure is logged.
pub async fn with_maintenance<T>(
    facade: &dyn AppFacade,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    let previous = facade.query_status().await?.maintenance;
    facade.set_maintenance_mode(true).await?;
    let result = op.await;
    match facade.set_maintenance_mode(previous).await {
        Ok(_) => result,
        Err(restore_err) => match result {
            Ok(_) => Err(restore_err),
            Err(op_err) => {
                tracing::warn!(
                    "Failed to restore maintenance mode after a failed operation: {}",
                    restore_err
                );
                Err(op_err)
            }
        },
    }
}
