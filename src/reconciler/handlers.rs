//! Per-event handlers.
//!
//! Each handler takes the loaded lifecycle state and the leadership
//! snapshot, performs its side effects through the injected collaborators,
//! and reports whether the event was handled or must be redelivered.

use crate::error::Result;
use crate::event::{EventContext, MasterDescriptor, Outcome};
use crate::reconciler::Reconciler;
use crate::relation::RENDERED_CONFIG_KEY;
use crate::state::LifecycleState;
use crate::status::UnitStatus;
use std::path::Path;

impl Reconciler {
    /// Install: dependency install runs every time; the source fetch runs
    /// exactly once. A fetch failure propagates without marking fetched.
    pub(crate) async fn on_install(&self, state: &mut LifecycleState) -> Result<Outcome> {
        self.workload
            .set_status(&UnitStatus::Maintenance("installing dependencies...".into()))
            .await;
        self.workload.install_dependencies().await?;

        if !state.fetched {
            self.workload
                .set_status(&UnitStatus::Maintenance("fetching sync server source...".into()))
                .await;
            self.workload
                .fetch_and_extract(&self.config.source_tarball)
                .await?;
            self.workload.fix_ownership(&self.config.app_root).await?;
            state.fetched = true;
        }

        self.start_pending_mount(state).await?;
        Ok(Outcome::Handled)
    }

    /// Config-changed: always re-renders everything and restarts the web
    /// server. Deliberately not guarded by the configured flags: this is
    /// the single re-entry point for "apply current desired config".
    pub(crate) async fn on_config_changed(&self, state: &mut LifecycleState) -> Result<Outcome> {
        self.workload
            .set_status(&UnitStatus::Maintenance("configuring web server...".into()))
            .await;
        self.workload.render_web_server_config().await?;
        state.web_server_configured = true;

        self.workload
            .set_status(&UnitStatus::Maintenance("configuring runtime...".into()))
            .await;
        self.workload
            .render_runtime_config(&self.config.runtime)
            .await?;
        state.runtime_configured = true;

        if state.initialized {
            self.facade
                .set_overwrite_protocol(&self.config.overwrite_protocol)
                .await?;
        }

        self.workload.restart_web_server().await?;
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_start(&self, state: &LifecycleState) -> Result<Outcome> {
        if !state.initialized {
            return Ok(Outcome::Deferred("sync server not initialized yet"));
        }
        self.workload.restart_web_server().await?;
        self.workload
            .open_public_port(self.config.public_port)
            .await?;
        Ok(Outcome::Handled)
    }

    /// A newly elected leader republishes unconditionally: the previous
    /// leader may have left mid-update.
    pub(crate) async fn on_leader_elected(
        &self,
        state: &LifecycleState,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if !ctx.is_leader {
            // Stale delivery; only meaningful for the unit that is now leader.
            return Ok(Outcome::Handled);
        }
        self.push_cluster_config(state).await?;
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_database_relation_joined(
        &self,
        requested: Option<&str>,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if ctx.is_leader {
            let extensions = self.config.database_extensions.join(",");
            self.database
                .set_app_many(&[
                    ("database", self.config.database_name.clone()),
                    ("extensions", extensions),
                ])
                .await?;
            return Ok(Outcome::Handled);
        }
        if requested != Some(self.config.database_name.as_str()) {
            // Leader has not set requirements yet. Defer, in case this
            // unit becomes leader and must perform that operation.
            return Ok(Outcome::Deferred("database name not yet requested"));
        }
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_master_changed(
        &self,
        state: &mut LifecycleState,
        master: &MasterDescriptor,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if master.dbname != self.config.database_name {
            // Cross-tenant noise on a shared relation; not our database.
            tracing::debug!("Ignoring master event for database '{}'", master.dbname);
            return Ok(Outcome::Handled);
        }
        if !state.fetched {
            // Nothing can be installed or adopted into a missing app tree.
            return Ok(Outcome::Deferred("sync server source not fetched yet"));
        }

        if !ctx.is_leader {
            // Followers trust the leader's replicated config instead of
            // re-running installation, but only once it is visible.
            if self.cluster.get_app(RENDERED_CONFIG_KEY).await?.is_none() {
                return Ok(Outcome::Deferred("leader config not yet replicated"));
            }
            state.database_available = true;
            state.initialized = true;
            return Ok(Outcome::Handled);
        }

        if !master.is_present {
            // Forget the stale descriptor, but never regress availability:
            // re-running the one-shot install on a transient failover would
            // be worse than a stale flag (see DESIGN.md).
            state.clear_master();
            return Ok(Outcome::Handled);
        }

        state.record_master(master);
        state.database_available = true;
        if !state.initialized {
            self.leader_bootstrap(state).await?;
        }
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_cluster_joined(
        &self,
        state: &LifecycleState,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if !ctx.is_leader {
            return Ok(Outcome::Handled);
        }
        if !state.initialized {
            return Ok(Outcome::Deferred("not initialized; nothing to push yet"));
        }
        self.push_cluster_config(state).await?;
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_cluster_changed(
        &self,
        state: &mut LifecycleState,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if ctx.is_leader {
            // The leader publishes; only followers consume.
            return Ok(Outcome::Handled);
        }
        self.adopt_cluster_config(state).await
    }

    pub(crate) async fn on_cluster_departed(
        &self,
        state: &LifecycleState,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if !ctx.is_leader {
            return Ok(Outcome::Handled);
        }
        if !state.initialized {
            return Ok(Outcome::Deferred("not initialized; nothing to push yet"));
        }
        self.push_cluster_config(state).await?;
        Ok(Outcome::Handled)
    }

    /// Update-status: pure projection (done by dispatch); the leader
    /// additionally refreshes the cached workload version, a read-only
    /// query against the application.
    pub(crate) async fn on_update_status(
        &self,
        state: &mut LifecycleState,
        ctx: EventContext,
    ) -> Result<Outcome> {
        if ctx.is_leader && state.is_ready() {
            let facade_status = self.facade.query_status().await?;
            state.workload_version = Some(facade_status.version);
        }
        Ok(Outcome::Handled)
    }

    pub(crate) async fn on_storage_attached(
        &self,
        state: &mut LifecycleState,
        location: &Path,
    ) -> Result<Outcome> {
        if state.data_dir_overridden {
            // The override is once-only; redeliveries are ignored.
            tracing::debug!(
                "Data dir already overridden, ignoring {}",
                location.display()
            );
        } else {
            state.data_dir = location.to_path_buf();
            state.data_dir_overridden = true;
        }
        self.start_pending_mount(state).await?;
        Ok(Outcome::Handled)
    }

    /// Ordering between install and storage-attach is not guaranteed by
    /// the substrate, so the mount check runs on both events.
    pub(crate) async fn start_pending_mount(&self, state: &LifecycleState) -> Result<()> {
        if state.fetched && state.data_dir_overridden {
            self.workload.start_data_mount(&state.data_dir).await?;
        }
        Ok(())
    }
}
