//! Operator-invoked actions.

use crate::error::Result;
use crate::event::{ActionKind, EventContext};
use crate::facade::{with_maintenance, TRUSTED_DOMAINS_KEY};
use crate::reconciler::Reconciler;
use crate::state::LifecycleState;

impl Reconciler {
    /// Run one action and return its human-readable output.
    pub(crate) async fn run_action(
        &self,
        kind: &ActionKind,
        state: &mut LifecycleState,
        ctx: EventContext,
    ) -> Result<String> {
        match kind {
            ActionKind::SetTrustedDomain { domain } => {
                self.facade
                    .set_config_key(TRUSTED_DOMAINS_KEY, 1, domain)
                    .await?;
                if ctx.is_leader {
                    self.push_cluster_config(state).await?;
                } else {
                    tracing::warn!(
                        "Not the leader; trusted domain '{}' set locally only",
                        domain
                    );
                }
                Ok(format!("Trusted domain set to {}", domain))
            }
            ActionKind::AddMissingIndices => self.facade.add_missing_indices().await,
            ActionKind::ConvertFilecacheEncoding => {
                // Must not run against a live filecache.
                with_maintenance(
                    self.facade.as_ref(),
                    self.facade.convert_filecache_encoding(),
                )
                .await
            }
            ActionKind::Maintenance { enable } => self.facade.set_maintenance_mode(*enable).await,
        }
    }
}
