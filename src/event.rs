//! Lifecycle events and handler outcomes.
//!
//! The delivery substrate hands the unit one named event at a time. Events
//! are a closed union so the reconciler's dispatch is exhaustiveness-checked
//! by the compiler instead of a runtime handler table.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A lifecycle event delivered by the substrate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Install,
    ConfigChanged,
    Start,
    UpdateStatus,
    LeaderElected,
    /// The database relation was joined. `requested` carries the database
    /// name currently set on the relation request, if any.
    DatabaseRelationJoined { requested: Option<String> },
    DatabaseMasterChanged { master: MasterDescriptor },
    ClusterRelationJoined,
    ClusterRelationChanged,
    ClusterRelationDeparted,
    ClusterRelationBroken,
    /// Storage was attached at `location`; overrides the data dir once.
    StorageAttached { location: PathBuf },
    Action(ActionKind),
}

/// Operator-invoked actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    SetTrustedDomain { domain: String },
    AddMissingIndices,
    ConvertFilecacheEncoding,
    Maintenance { enable: bool },
}

/// Connection descriptor received from the database relation.
///
/// `is_present == false` models "no master currently"; the other fields are
/// then stale and must not be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Database kind, e.g. "pgsql".
    pub kind: String,
    pub is_present: bool,
}

/// What a handler did with its event.
///
/// Fatal failures are not a variant: they propagate as `Err` through the
/// crate [`Result`](crate::error::Result) like every other error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was processed to completion.
    Handled,
    /// A precondition is not yet met; the substrate should redeliver the
    /// same event later. No state was mutated.
    Deferred(&'static str),
}

/// Per-dispatch context snapshotted before the handler runs.
///
/// Leadership is captured once at dispatch time and never re-queried inside
/// a handler, so a leadership flip mid-handler cannot split its view.
#[derive(Debug, Clone, Copy)]
pub struct EventContext {
    pub is_leader: bool,
}

impl Event {
    /// Parse a hook invocation into an event.
    ///
    /// `params` carries the event's structured payload as JSON where the
    /// event has one (master descriptors, storage locations, the requested
    /// database name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] for an unrecognized name and a JSON
    /// error if the payload does not match the event's parameter shape.
    pub fn parse(name: &str, params: Option<&str>) -> Result<Event> {
        let event = match name {
            "install" => Event::Install,
            "config-changed" => Event::ConfigChanged,
            "start" => Event::Start,
            "update-status" => Event::UpdateStatus,
            "leader-elected" => Event::LeaderElected,
            "database-relation-joined" => {
                let requested = match params {
                    Some(raw) => serde_json::from_str(raw)?,
                    None => None,
                };
                Event::DatabaseRelationJoined { requested }
            }
            "database-master-changed" => {
                let raw = params.ok_or_else(|| {
                    Error::UnknownEvent("database-master-changed requires --params".to_string())
                })?;
                Event::DatabaseMasterChanged {
                    master: serde_json::from_str(raw)?,
                }
            }
            "cluster-relation-joined" => Event::ClusterRelationJoined,
            "cluster-relation-changed" => Event::ClusterRelationChanged,
            "cluster-relation-departed" => Event::ClusterRelationDeparted,
            "cluster-relation-broken" => Event::ClusterRelationBroken,
            "storage-attached" => {
                let raw = params.ok_or_else(|| {
                    Error::UnknownEvent("storage-attached requires --params".to_string())
                })?;
                let location: PathBuf = serde_json::from_str(raw)?;
                Event::StorageAttached { location }
            }
            other => return Err(Error::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::ConfigChanged => "config-changed",
            Event::Start => "start",
            Event::UpdateStatus => "update-status",
            Event::LeaderElected => "leader-elected",
            Event::DatabaseRelationJoined { .. } => "database-relation-joined",
            Event::DatabaseMasterChanged { .. } => "database-master-changed",
            Event::ClusterRelationJoined => "cluster-relation-joined",
            Event::ClusterRelationChanged => "cluster-relation-changed",
            Event::ClusterRelationDeparted => "cluster-relation-departed",
            Event::ClusterRelationBroken => "cluster-relation-broken",
            Event::StorageAttached { .. } => "storage-attached",
            Event::Action(kind) => kind.name(),
        }
    }
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::SetTrustedDomain { .. } => "set-trusted-domain",
            ActionKind::AddMissingIndices => "add-missing-indices",
            ActionKind::ConvertFilecacheEncoding => "convert-filecache-encoding",
            ActionKind::Maintenance { .. } => "maintenance",
        }
    }
}

impl MasterDescriptor {
    /// A descriptor announcing master absence for the given database.
    pub fn absent(dbname: &str) -> Self {
        Self {
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            dbname: dbname.to_string(),
            kind: String::new(),
            is_present: false,
        }
    }
}
