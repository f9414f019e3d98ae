use crate::event::MasterDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-unit lifecycle state, persisted across reconciler restarts.
///
/// The convergence lattice is derived from the booleans here rather than
/// stored as a single state field: `fetched` and `database_available` are
/// independent axes, and the `*_configured` flags may be re-set on every
/// config-changed event without touching `initialized`.
///
/// Invariant: `initialized` implies `database_available`. Nothing regresses
/// a field to false; a vanished database master clears only the cached
/// connection fields (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleState {
    /// Application source has been fetched and extracted.
    pub fetched: bool,

    /// One-shot application install has completed (leader) or the leader's
    /// config was adopted (follower).
    pub initialized: bool,

    /// A database master has been observed for our database.
    pub database_available: bool,

    pub web_server_configured: bool,
    pub runtime_configured: bool,

    #[serde(default)]
    pub object_storage_configured: bool,

    /// Data directory; overridden exactly once by a storage-attach event.
    pub data_dir: PathBuf,

    /// Whether a storage-attach event already overrode `data_dir`.
    #[serde(default)]
    pub data_dir_overridden: bool,

    // Connection fields, meaningful only while `database_available`.
    #[serde(default)]
    pub db_host: Option<String>,
    #[serde(default)]
    pub db_port: Option<u16>,
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default)]
    pub db_pass: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub db_type: Option<String>,

    /// Last workload version reported by the facade (leader refreshes it).
    #[serde(default)]
    pub workload_version: Option<String>,

    /// Generation of the last adopted leader push. Older pushes from a
    /// deposed leader are discarded.
    #[serde(default)]
    pub adopted_generation: u64,

    pub updated_at: DateTime<Utc>,
}

/// Connection descriptor handed to the facade's one-shot install.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConnection {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub kind: String,
}

impl LifecycleState {
    pub fn new(default_data_dir: &Path) -> Self {
        Self {
            fetched: false,
            initialized: false,
            database_available: false,
            web_server_configured: false,
            runtime_configured: false,
            object_storage_configured: false,
            data_dir: default_data_dir.to_path_buf(),
            data_dir_overridden: false,
            db_host: None,
            db_port: None,
            db_user: None,
            db_pass: None,
            db_name: None,
            db_type: None,
            workload_version: None,
            adopted_generation: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record the connection fields from a present master descriptor.
    pub fn record_master(&mut self, master: &MasterDescriptor) {
        self.db_host = Some(master.host.clone());
        self.db_port = Some(master.port);
        self.db_user = Some(master.user.clone());
        self.db_pass = Some(master.password.clone());
        self.db_name = Some(master.dbname.clone());
        self.db_type = Some(master.kind.clone());
    }

    /// Forget the cached connection fields. Does not touch
    /// `database_available` or `initialized`.
    pub fn clear_master(&mut self) {
        self.db_host = None;
        self.db_port = None;
        self.db_user = None;
        self.db_pass = None;
        self.db_name = None;
        self.db_type = None;
    }

    /// Build the install descriptor, if all connection fields are present.
    pub fn connection(&self) -> Option<DatabaseConnection> {
        Some(DatabaseConnection {
            host: self.db_host.clone()?,
            user: self.db_user.clone()?,
            password: self.db_pass.clone()?,
            name: self.db_name.clone()?,
            kind: self.db_type.clone()?,
        })
    }

    /// All convergence conditions met.
    pub fn is_ready(&self) -> bool {
        self.fetched
            && self.initialized
            && self.database_available
            && self.web_server_configured
            && self.runtime_configured
    }
}
