//! The cluster reconciliation core.
//!
//! One [`Reconciler`] processes exactly one event to completion at a time;
//! the delivery substrate serializes delivery per unit, so there is no
//! internal parallelism and no shared mutable state across invocations.
//! Handlers receive the persisted [`LifecycleState`](crate::state::LifecycleState)
//! and a leadership snapshot taken at dispatch time.
//!
//! Deferral is the only retry primitive: a handler that cannot proceed
//! returns [`Outcome::Deferred`] without mutating state, and the substrate
//! redelivers the same event later. State is only persisted for handled
//! events, which enforces that contract structurally.

mod actions;
mod bootstrap;
mod cluster;
mod handlers;

use crate::config::CharmConfig;
use crate::event::{Event, EventContext, Outcome};
use crate::facade::AppFacade;
use crate::relation::RelationStore;
use crate::state::StateStore;
use crate::status;
use crate::workload::Workload;
use crate::Result;
use std::sync::Arc;

/// The reconciliation state machine and its collaborators.
pub struct Reconciler {
    config: CharmConfig,
    facade: Arc<dyn AppFacade>,
    workload: Arc<dyn Workload>,
    cluster: Arc<dyn RelationStore>,
    database: Arc<dyn RelationStore>,
    store: StateStore,
}

impl Reconciler {
    pub fn new(
        config: CharmConfig,
        facade: Arc<dyn AppFacade>,
        workload: Arc<dyn Workload>,
        cluster: Arc<dyn RelationStore>,
        database: Arc<dyn RelationStore>,
        store: StateStore,
    ) -> Self {
        Self {
            config,
            facade,
            workload,
            cluster,
            database,
            store,
        }
    }

    /// Process one event to completion.
    ///
    /// Loads the persisted state, runs the matching handler, persists the
    /// state again only if the event was handled (a deferred event must
    /// leave no trace), and re-projects the visible unit status.
    ///
    /// # Errors
    ///
    /// Fatal conditions (source fetch failure, one-shot install failure,
    /// invariant violations) propagate; the substrate surfaces them as an
    /// event-processing failure.
    pub async fn dispatch(&self, event: Event, ctx: EventContext) -> Result<Outcome> {
        let mut state = self.store.load_or_init(&self.config.data_dir)?;
        let name = event.name();
        tracing::info!("Processing {} (leader: {})", name, ctx.is_leader);

        let outcome = match event {
            Event::Install => self.on_install(&mut state).await?,
            Event::ConfigChanged => self.on_config_changed(&mut state).await?,
            Event::Start => self.on_start(&state).await?,
            Event::UpdateStatus => self.on_update_status(&mut state, ctx).await?,
            Event::LeaderElected => self.on_leader_elected(&state, ctx).await?,
            Event::DatabaseRelationJoined { requested } => {
                self.on_database_relation_joined(requested.as_deref(), ctx)
                    .await?
            }
            Event::DatabaseMasterChanged { master } => {
                self.on_master_changed(&mut state, &master, ctx).await?
            }
            Event::ClusterRelationJoined => self.on_cluster_joined(&state, ctx).await?,
            Event::ClusterRelationChanged => self.on_cluster_changed(&mut state, ctx).await?,
            Event::ClusterRelationDeparted => self.on_cluster_departed(&state, ctx).await?,
            // Relation teardown rolls back nothing.
            Event::ClusterRelationBroken => Outcome::Handled,
            Event::StorageAttached { location } => {
                self.on_storage_attached(&mut state, &location).await?
            }
            Event::Action(kind) => {
                let output = self.run_action(&kind, &mut state, ctx).await?;
                tracing::info!("Action {} output: {}", kind.name(), output);
                Outcome::Handled
            }
        };

        match outcome {
            Outcome::Handled => self.store.save(&mut state)?,
            Outcome::Deferred(reason) => {
                tracing::info!("Deferring {}: {}", name, reason);
            }
        }

        self.workload.set_status(&status::project(&state)).await;
        Ok(outcome)
    }

    /// Run an action and return its raw output for the action result.
    pub async fn run_action_event(
        &self,
        kind: &crate::event::ActionKind,
        ctx: EventContext,
    ) -> Result<String> {
        let mut state = self.store.load_or_init(&self.config.data_dir)?;
        let output = self.run_action(kind, &mut state, ctx).await?;
        self.store.save(&mut state)?;
        Ok(output)
    }

    pub fn config(&self) -> &CharmConfig {
        &self.config
    }
}
