//! Leader Bootstrap: the one-shot application install.
//!
//! Runs at most once per application instance, on the leader, once a
//! database master is known. Failure is terminal for the unit; the install
//! is not safe to re-run against a half-initialized database schema.

use crate::error::{Error, Result};
use crate::facade::{AdminCredentials, TRUSTED_DOMAINS_KEY};
use crate::reconciler::Reconciler;
use crate::relation::INGRESS_ADDRESS_KEY;
use crate::state::LifecycleState;
use crate::status::UnitStatus;

impl Reconciler {
    /// Install the application against the recorded database master and
    /// seed the trusted-domain list.
    ///
    /// `initialized` is only set after the facade's own status query
    /// confirms the install, so a crash between install and confirmation
    /// surfaces as a failed unit rather than a silently half-bootstrapped
    /// one.
    pub(crate) async fn leader_bootstrap(&self, state: &mut LifecycleState) -> Result<()> {
        self.workload
            .set_status(&UnitStatus::Maintenance("installing sync server...".into()))
            .await;

        // The install writes into both trees as the app user.
        self.workload.fix_ownership(&self.config.app_root).await?;
        self.workload.fix_ownership(&state.data_dir).await?;

        let db = state.connection().ok_or_else(|| {
            Error::Internal("leader bootstrap reached without a database connection".to_string())
        })?;
        let admin = AdminCredentials {
            username: self.config.admin_username.clone(),
            password: self.config.admin_password.clone(),
        };
        let output = self.facade.install(&db, &admin, &state.data_dir).await?;
        tracing::debug!("Install output: {}", output);

        if let Some(fqdn) = &self.config.fqdn {
            self.facade
                .set_config_key(TRUSTED_DOMAINS_KEY, 1, fqdn)
                .await?;
        }
        let local = self.cluster.local_unit().to_string();
        match self.cluster.get_unit(&local, INGRESS_ADDRESS_KEY).await? {
            Some(addr) => {
                self.facade
                    .set_config_key(TRUSTED_DOMAINS_KEY, 2, &addr)
                    .await?;
            }
            None => {
                tracing::warn!("Own ingress address not yet available; trusted domains incomplete");
            }
        }

        self.facade.install_background_cron().await?;

        let status = self.facade.query_status().await?;
        if !status.installed {
            return Err(Error::InstallFailed(
                "application reports not installed after install completed".to_string(),
            ));
        }
        state.initialized = true;
        state.workload_version = Some(status.version.clone());
        tracing::info!("Sync server installed (version {})", status.version);
        Ok(())
    }
}
