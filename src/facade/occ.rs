//! Shell-backed facade implementation.
//!
//! Runs the application's `occ` CLI as the configured system user from the
//! application root, the same way an operator would by hand. Output is
//! captured; a non-zero exit maps to a facade error except where noted.

use crate::error::{Error, Result};
use crate::facade::{AdminCredentials, AppFacade, FacadeStatus};
use crate::state::DatabaseConnection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct OccFacade {
    app_root: PathBuf,
    system_user: String,
}

impl OccFacade {
    pub fn new(app_root: PathBuf, system_user: String) -> Self {
        Self {
            app_root,
            system_user,
        }
    }

    /// Run an occ subcommand, returning trimmed stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("sudo")
            .arg("-u")
            .arg(&self.system_user)
            .arg("php")
            .arg("occ")
            .args(args)
            .current_dir(&self.app_root)
            .output()
            .await
            .map_err(|e| Error::Facade(format!("failed to execute occ {}: {}", args[0], e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Facade(format!(
                "occ {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl AppFacade for OccFacade {
    async fn install(
        &self,
        db: &DatabaseConnection,
        admin: &AdminCredentials,
        data_dir: &Path,
    ) -> Result<String> {
        let data_dir = data_dir.display().to_string();
        let args = [
            "maintenance:install",
            "--database",
            &db.kind,
            "--database-name",
            &db.name,
            "--database-host",
            &db.host,
            "--database-user",
            &db.user,
            "--database-pass",
            &db.password,
            "--admin-user",
            &admin.username,
            "--admin-pass",
            &admin.password,
            "--data-dir",
            &data_dir,
        ];
        // Remap to the install-specific error so callers treat it as fatal.
        self.run(&args)
            .await
            .map_err(|e| Error::InstallFailed(e.to_string()))
    }

    async fn set_config_key(&self, key: &str, index: usize, value: &str) -> Result<()> {
        let index = index.to_string();
        let value_arg = format!("--value={}", value);
        self.run(&["config:system:set", key, &index, &value_arg])
            .await?;
        Ok(())
    }

    async fn delete_config_keys(&self, key: &str) -> Result<()> {
        self.run(&["config:system:delete", key]).await?;
        Ok(())
    }

    async fn get_config_keys(&self, key: &str) -> Result<Vec<String>> {
        let out = self.run(&["config:system:get", key]).await?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }

    async fn set_maintenance_mode(&self, enable: bool) -> Result<String> {
        let flag = if enable { "--on" } else { "--off" };
        self.run(&["maintenance:mode", flag]).await
    }

    async fn query_status(&self) -> Result<FacadeStatus> {
        let out = self
            .run(&["status", "--output=json", "--no-warnings"])
            .await?;
        // The CLI may prefix warnings; the JSON document is the last line.
        let json_line = out
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| Error::Facade(format!("no JSON in occ status output: {}", out)))?;
        let status: FacadeStatus = serde_json::from_str(json_line)?;
        Ok(status)
    }

    async fn set_overwrite_protocol(&self, protocol: &str) -> Result<()> {
        if protocol != "http" && protocol != "https" {
            return Err(Error::UnsupportedProtocol(protocol.to_string()));
        }
        tracing::info!("Setting overwriteprotocol to: {}", protocol);
        let value_arg = format!("--value={}", protocol);
        self.run(&["config:system:set", "overwriteprotocol", &value_arg])
            .await?;
        Ok(())
    }

    async fn add_missing_indices(&self) -> Result<String> {
        self.run(&["db:add-missing-indices"]).await
    }

    async fn convert_filecache_encoding(&self) -> Result<String> {
        self.run(&["db:convert-filecache-bigint", "--no-interaction"])
            .await
    }

    async fn install_background_cron(&self) -> Result<String> {
        self.run(&["background:cron"]).await
    }
}
