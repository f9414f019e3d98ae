//! Operator configuration.
//!
//! Loaded from `syncop.yaml` (or the path given with `--config`). Every field
//! has a sensible default so a bare file deploys a working single unit; the
//! values here are rendered into the workload configuration and passed to the
//! App Control Facade during install.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for syncop.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharmConfig {
    /// Name of the database requested from the database relation.
    /// Master-changed events for any other database name are ignored.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Database extensions requested on the relation by the leader.
    #[serde(default = "default_database_extensions")]
    pub database_extensions: Vec<String>,

    /// Admin account created by the one-shot application install.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default)]
    pub admin_password: String,

    /// Public fqdn seeded into the trusted-domain list at index 1 (if set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,

    /// Archive the workload source is fetched from on install.
    #[serde(default = "default_source_tarball")]
    pub source_tarball: String,

    /// Protocol the application generates links with ("http" or "https").
    #[serde(default = "default_overwrite_protocol")]
    pub overwrite_protocol: String,

    /// Port opened to the outside once the unit starts.
    #[serde(default = "default_public_port")]
    pub public_port: u16,

    /// Root of the installed application tree.
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,

    /// Default data directory. A storage-attach event overrides this once.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// System user the application (and its CLI) runs as.
    #[serde(default = "default_system_user")]
    pub system_user: String,

    /// Runtime tuning rendered into the workload's runtime config.
    #[serde(default)]
    pub runtime: RuntimeTuning,
}

/// Upload/memory limits rendered into the runtime configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeTuning {
    #[serde(default = "default_max_file_uploads")]
    pub max_file_uploads: u32,

    #[serde(default = "default_upload_max_filesize")]
    pub upload_max_filesize: String,

    #[serde(default = "default_post_max_size")]
    pub post_max_size: String,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,
}

fn default_database_name() -> String {
    "syncserver".to_string()
}

fn default_database_extensions() -> Vec<String> {
    vec!["citext".to_string()]
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_source_tarball() -> String {
    "https://download.example.org/syncserver/latest.tar.bz2".to_string()
}

fn default_overwrite_protocol() -> String {
    "http".to_string()
}

fn default_public_port() -> u16 {
    80
}

fn default_app_root() -> PathBuf {
    PathBuf::from("/var/www/syncserver")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/www/syncserver/data")
}

fn default_system_user() -> String {
    "www-data".to_string()
}

fn default_max_file_uploads() -> u32 {
    50
}

fn default_upload_max_filesize() -> String {
    "512M".to_string()
}

fn default_post_max_size() -> String {
    "512M".to_string()
}

fn default_memory_limit() -> String {
    "512M".to_string()
}

impl Default for RuntimeTuning {
    fn default() -> Self {
        Self {
            max_file_uploads: default_max_file_uploads(),
            upload_max_filesize: default_upload_max_filesize(),
            post_max_size: default_post_max_size(),
            memory_limit: default_memory_limit(),
        }
    }
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
            database_extensions: default_database_extensions(),
            admin_username: default_admin_username(),
            admin_password: String::new(),
            fqdn: None,
            source_tarball: default_source_tarball(),
            overwrite_protocol: default_overwrite_protocol(),
            public_port: default_public_port(),
            app_root: default_app_root(),
            data_dir: default_data_dir(),
            system_user: default_system_user(),
            runtime: RuntimeTuning::default(),
        }
    }
}

impl CharmConfig {
    /// Load configuration from a YAML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// fails validation (for example an unsupported overwrite protocol).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Could not read {}: {}", path.display(), e))
        })?;
        let config: CharmConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or fall back to defaults if no file exists.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate configuration values.
    ///
    /// An unsupported protocol is fatal here rather than at apply time so a
    /// bad value never reaches the facade.
    pub fn validate(&self) -> Result<()> {
        if self.overwrite_protocol != "http" && self.overwrite_protocol != "https" {
            return Err(Error::UnsupportedProtocol(self.overwrite_protocol.clone()));
        }
        if self.database_name.is_empty() {
            return Err(Error::Validation("database_name must not be empty".into()));
        }
        if self.admin_username.is_empty() {
            return Err(Error::Validation("admin_username must not be empty".into()));
        }
        Ok(())
    }

    /// Path of the application's primary rendered config artifact.
    pub fn config_artifact(&self) -> PathBuf {
        self.app_root.join("config/config.php")
    }

    /// Path of the optional object-storage config artifact.
    pub fn object_storage_artifact(&self) -> PathBuf {
        self.app_root.join("config/object_storage.config.php")
    }
}
