//! Cluster Config Push (leader) and Follower Config Adopt.
//!
//! The leader is the only writer of application-scoped relation keys; the
//! rendered config blob, the optional object-storage blob and the
//! leader-generation counter are written in one replication step. Followers
//! converge by copying the blobs verbatim and may observe them in any
//! order relative to their own events; a stale read simply re-adopts on
//! the next changed delivery.

use crate::error::{Error, Result};
use crate::event::Outcome;
use crate::facade::TRUSTED_DOMAINS_KEY;
use crate::reconciler::Reconciler;
use crate::relation::{
    CONFIG_GENERATION_KEY, INGRESS_ADDRESS_KEY, OBJECT_STORAGE_CONFIG_KEY, RENDERED_CONFIG_KEY,
};
use crate::state::LifecycleState;

impl Reconciler {
    /// Leader-only: rewrite the trusted-domain list from current peer
    /// addresses and replicate the rendered config to the app scope.
    ///
    /// Skips quietly while uninitialized (there is nothing to push); once
    /// initialized, a missing config artifact is an invariant violation
    /// and therefore fatal.
    pub(crate) async fn push_cluster_config(&self, state: &LifecycleState) -> Result<()> {
        if !state.initialized {
            tracing::debug!("Not initialized; skipping cluster config push");
            return Ok(());
        }

        let domain_count = self.rebuild_trusted_domains().await?;

        let artifact = self.config.config_artifact();
        let blob = self
            .workload
            .read_artifact(&artifact)
            .await?
            .ok_or(Error::MissingArtifact(artifact))?;

        let generation = self.next_generation().await?;
        let mut pairs = vec![
            (RENDERED_CONFIG_KEY, blob),
            (CONFIG_GENERATION_KEY, generation.to_string()),
        ];
        if let Some(secondary) = self
            .workload
            .read_artifact(&self.config.object_storage_artifact())
            .await?
        {
            pairs.push((OBJECT_STORAGE_CONFIG_KEY, secondary));
        }
        self.cluster.set_app_many(&pairs).await?;

        tracing::info!(
            "Pushed cluster config at generation {} ({} trusted domains)",
            generation,
            domain_count
        );
        Ok(())
    }

    /// Replace the trusted-domain list: the two reserved entries
    /// (localhost, fqdn) survive; everything after them becomes the
    /// current peer ingress addresses plus our own, deduplicated, in
    /// relation iteration order with self last.
    async fn rebuild_trusted_domains(&self) -> Result<usize> {
        let current = self.facade.get_config_keys(TRUSTED_DOMAINS_KEY).await?;
        let mut domains: Vec<String> = current.into_iter().take(2).collect();

        for unit in self.cluster.list_units().await? {
            if let Some(addr) = self.cluster.get_unit(&unit, INGRESS_ADDRESS_KEY).await? {
                if !domains.contains(&addr) {
                    domains.push(addr);
                }
            }
        }
        let local = self.cluster.local_unit().to_string();
        if let Some(addr) = self.cluster.get_unit(&local, INGRESS_ADDRESS_KEY).await? {
            if !domains.contains(&addr) {
                domains.push(addr);
            }
        }

        // Full delete-then-rewrite: indices may be non-contiguous after
        // peer churn, so in-place updates cannot be trusted.
        self.facade.delete_config_keys(TRUSTED_DOMAINS_KEY).await?;
        for (index, domain) in domains.iter().enumerate() {
            self.facade
                .set_config_key(TRUSTED_DOMAINS_KEY, index, domain)
                .await?;
        }
        Ok(domains.len())
    }

    async fn next_generation(&self) -> Result<u64> {
        let current = self
            .cluster
            .get_app(CONFIG_GENERATION_KEY)
            .await?
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(current + 1)
    }

    /// Follower-only: copy the leader's blobs to disk and become
    /// initialized. The only path by which a follower initializes.
    pub(crate) async fn adopt_cluster_config(
        &self,
        state: &mut LifecycleState,
    ) -> Result<Outcome> {
        if !state.fetched {
            return Ok(Outcome::Deferred("sync server source not fetched yet"));
        }
        let blob = match self.cluster.get_app(RENDERED_CONFIG_KEY).await? {
            Some(blob) => blob,
            None => return Ok(Outcome::Deferred("leader config not yet replicated")),
        };

        let generation = self
            .cluster
            .get_app(CONFIG_GENERATION_KEY)
            .await?
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        if generation < state.adopted_generation {
            // A deposed leader's push raced the one we already adopted.
            tracing::warn!(
                "Discarding stale config push (generation {} < {})",
                generation,
                state.adopted_generation
            );
            return Ok(Outcome::Handled);
        }

        self.workload
            .write_artifact(&self.config.config_artifact(), &blob)
            .await?;
        if let Some(secondary) = self.cluster.get_app(OBJECT_STORAGE_CONFIG_KEY).await? {
            self.workload
                .write_artifact(&self.config.object_storage_artifact(), &secondary)
                .await?;
            state.object_storage_configured = true;
        }
        // The installer creates the data marker on the leader; the facade
        // CLI refuses to run against a data dir without it.
        self.workload
            .write_artifact(&state.data_dir.join(".ocdata"), "")
            .await?;
        // The blobs arrive via root; hand them back to the app user.
        self.workload.fix_ownership(&self.config.app_root).await?;
        self.workload.fix_ownership(&state.data_dir).await?;

        state.adopted_generation = generation;
        state.database_available = true;
        state.initialized = true;
        tracing::info!("Adopted leader config at generation {}", generation);
        Ok(Outcome::Handled)
    }
}
