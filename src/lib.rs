//! # Syncop
//!
//! A cluster operator core for a multi-unit file-sync web application.
//!
//! ## Features
//!
//! - **Leader-driven install**: exactly one unit performs the one-shot
//!   application install against the database master
//! - **Peer config replication**: the leader pushes its rendered config to
//!   followers over an eventually-consistent relation channel, fenced by a
//!   generation counter
//! - **Convergence**: units reach the same ready state regardless of event
//!   ordering, retries, or deferrals
//! - **Deferral**: the only retry primitive; a deferred event mutates no
//!   state and is redelivered by the substrate
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use syncop::{CharmConfig, Event, EventContext, Reconciler};
//! use syncop::facade::OccFacade;
//! use syncop::relation::HookToolRelation;
//! use syncop::state::StateStore;
//! use syncop::workload::HostWorkload;
//!
//! # async fn example() -> Result<(), syncop::Error> {
//! let config = CharmConfig::load_or_default(std::path::Path::new("syncop.yaml"))?;
//! let reconciler = Reconciler::new(
//!     config.clone(),
//!     Arc::new(OccFacade::new(config.app_root.clone(), config.system_user.clone())),
//!     Arc::new(HostWorkload::new(config.app_root.clone(), config.system_user.clone())),
//!     Arc::new(HookToolRelation::new("cluster")),
//!     Arc::new(HookToolRelation::new("db")),
//!     StateStore::new(std::path::PathBuf::from("/var/lib/syncop/state.json")),
//! );
//!
//! let is_leader = syncop::relation::is_leader().await?;
//! let outcome = reconciler
//!     .dispatch(Event::Install, EventContext { is_leader })
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! The substrate delivers one event at a time per unit; the reconciler holds
//! no locks and no background tasks. Everything it must remember across
//! events lives in the persisted [`state::LifecycleState`].

pub mod config;
pub mod error;
pub mod event;
pub mod facade;
pub mod reconciler;
pub mod relation;
pub mod state;
pub mod status;
pub mod workload;

// Re-export commonly used types
pub use config::{CharmConfig, RuntimeTuning};
pub use error::{Error, Result};
pub use event::{ActionKind, Event, EventContext, MasterDescriptor, Outcome};
pub use reconciler::Reconciler;
pub use status::UnitStatus;
