//! The shell/file executor boundary.
//!
//! Everything here is an idempotent privileged operation with no retained
//! state of its own: installing OS packages, fetching the source tree,
//! rendering config files, restarting the web server. The reconciler only
//! sees the trait; tests substitute a recording mock.

use crate::config::RuntimeTuning;
use crate::error::{Error, Result};
use crate::status::UnitStatus;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[async_trait]
pub trait Workload: Send + Sync {
    /// Install OS-level dependencies. Safe to re-run on every install event.
    async fn install_dependencies(&self) -> Result<()>;

    /// Fetch and extract the application source. Failure is fatal; the
    /// caller must not mark the unit fetched.
    async fn fetch_and_extract(&self, tarball_url: &str) -> Result<()>;

    /// Render the web-server vhost configuration.
    async fn render_web_server_config(&self) -> Result<()>;

    /// Render the runtime (interpreter) configuration.
    async fn render_runtime_config(&self, tuning: &RuntimeTuning) -> Result<()>;

    async fn restart_web_server(&self) -> Result<()>;

    async fn open_public_port(&self, port: u16) -> Result<()>;

    /// Recursively hand ownership of `path` to the application user.
    async fn fix_ownership(&self, path: &Path) -> Result<()>;

    /// Start the systemd mount unit backing the attached data directory.
    async fn start_data_mount(&self, data_dir: &Path) -> Result<()>;

    /// Read a config artifact, `None` if it does not exist.
    async fn read_artifact(&self, path: &Path) -> Result<Option<String>>;

    /// Write a config artifact verbatim, creating parent directories.
    async fn write_artifact(&self, path: &Path, contents: &str) -> Result<()>;

    /// Report the unit's visible status to the platform. Best effort;
    /// never fails the surrounding handler.
    async fn set_status(&self, status: &UnitStatus);
}

/// Production implementation shelling out on the unit's host.
pub struct HostWorkload {
    app_root: PathBuf,
    system_user: String,
}

impl HostWorkload {
    pub fn new(app_root: PathBuf, system_user: String) -> Self {
        Self {
            app_root,
            system_user,
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Workload(format!("failed to run {}: {}", program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Workload(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Derive the systemd mount unit name for a mount point, the same way
/// systemd-escape does for plain paths: strip slashes, join with dashes.
pub fn mount_unit_name(mount_point: &Path) -> String {
    let joined: Vec<String> = mount_point
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("{}.mount", joined.join("-"))
}

#[async_trait]
impl Workload for HostWorkload {
    async fn install_dependencies(&self) -> Result<()> {
        tracing::info!("Installing workload dependencies");
        self.run("apt-get", &["update", "-q"]).await?;
        self.run(
            "apt-get",
            &[
                "install",
                "-y",
                "-q",
                "apache2",
                "php",
                "php-fpm",
                "php-pgsql",
                "php-xml",
                "php-zip",
                "php-curl",
                "php-gd",
                "php-mbstring",
                "bzip2",
                "curl",
            ],
        )
        .await?;
        Ok(())
    }

    async fn fetch_and_extract(&self, tarball_url: &str) -> Result<()> {
        tracing::info!("Fetching workload source from {}", tarball_url);
        let parent = self
            .app_root
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .display()
            .to_string();
        let script = format!(
            "curl -sSfL '{}' | tar -xj -C '{}'",
            tarball_url, parent
        );
        self.run("sh", &["-c", &script])
            .await
            .map_err(|e| Error::FetchFailed(e.to_string()))?;
        Ok(())
    }

    async fn render_web_server_config(&self) -> Result<()> {
        let vhost = format!(
            "<VirtualHost *:80>\n\
             \x20 DocumentRoot {root}\n\
             \x20 <Directory {root}>\n\
             \x20   Require all granted\n\
             \x20   AllowOverride All\n\
             \x20   Options FollowSymLinks MultiViews\n\
             \x20 </Directory>\n\
             </VirtualHost>\n",
            root = self.app_root.display()
        );
        self.write_artifact(
            Path::new("/etc/apache2/sites-available/syncserver.conf"),
            &vhost,
        )
        .await?;
        self.run("a2ensite", &["syncserver"]).await?;
        self.run("a2dissite", &["000-default"]).await?;
        Ok(())
    }

    async fn render_runtime_config(&self, tuning: &RuntimeTuning) -> Result<()> {
        // A dedicated module file instead of editing the system-wide ini,
        // which may be overwritten from elsewhere.
        let ini = format!(
            "max_file_uploads = {}\n\
             upload_max_filesize = {}\n\
             post_max_size = {}\n\
             memory_limit = {}\n",
            tuning.max_file_uploads,
            tuning.upload_max_filesize,
            tuning.post_max_size,
            tuning.memory_limit
        );
        self.write_artifact(Path::new("/etc/php/conf.d/syncserver.ini"), &ini)
            .await?;
        Ok(())
    }

    async fn restart_web_server(&self) -> Result<()> {
        self.run("systemctl", &["restart", "apache2.service"]).await?;
        Ok(())
    }

    async fn open_public_port(&self, port: u16) -> Result<()> {
        let spec = format!("{}/tcp", port);
        self.run("open-port", &[&spec]).await?;
        Ok(())
    }

    async fn fix_ownership(&self, path: &Path) -> Result<()> {
        let owner = format!("{0}:{0}", self.system_user);
        let path = path.display().to_string();
        self.run("chown", &["-R", &owner, &path]).await?;
        Ok(())
    }

    async fn start_data_mount(&self, data_dir: &Path) -> Result<()> {
        let unit = mount_unit_name(data_dir);
        tracing::info!("Starting data mount unit {}", unit);
        self.run("systemctl", &["start", &unit]).await?;
        Ok(())
    }

    async fn read_artifact(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_artifact(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn set_status(&self, status: &UnitStatus) {
        let (kind, message) = match status {
            UnitStatus::Blocked(reason) => ("blocked", reason.clone()),
            UnitStatus::Maintenance(msg) => ("maintenance", msg.clone()),
            UnitStatus::Active(msg) => ("active", msg.clone()),
        };
        if let Err(e) = self.run("status-set", &[kind, &message]).await {
            tracing::warn!("Could not report unit status: {}", e);
        }
    }
}
