//! The eventually-consistent relation key/value channel.
//!
//! A relation is a per-participant string map replicated by the platform
//! with at-least-once delivery. The core only consumes get/set/iterate
//! semantics; writes to the application scope are restricted to the current
//! leader by convention (leadership is externally arbitrated, there is no
//! lock). Readers must tolerate transient absence of keys just written
//! elsewhere.

mod hooktool;
mod memory;

pub use hooktool::{is_leader, HookToolRelation};
pub use memory::InMemoryRelation;

use crate::error::Result;
use async_trait::async_trait;

/// App-scoped key holding the leader's full rendered primary config.
pub const RENDERED_CONFIG_KEY: &str = "rendered_config";

/// App-scoped key holding the optional object-storage config artifact.
pub const OBJECT_STORAGE_CONFIG_KEY: &str = "object_storage_config";

/// App-scoped monotonic leader-generation counter, written with every push
/// so followers can discard stale pushes from a deposed leader.
pub const CONFIG_GENERATION_KEY: &str = "config_generation";

/// Per-unit key written by the platform; read-only to the core.
pub const INGRESS_ADDRESS_KEY: &str = "ingress-address";

/// Access to one relation instance.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Name of this unit within the relation.
    fn local_unit(&self) -> &str;

    /// Remote units currently in the relation (excludes the local unit).
    async fn list_units(&self) -> Result<Vec<String>>;

    async fn get_unit(&self, unit: &str, key: &str) -> Result<Option<String>>;

    /// Write a key in this unit's own scope.
    async fn set_unit(&self, key: &str, value: &str) -> Result<()>;

    async fn get_app(&self, key: &str) -> Result<Option<String>>;

    /// Write a key in the application scope. Leader-only by convention.
    async fn set_app(&self, key: &str, value: &str) -> Result<()>;

    /// Write several application-scoped keys in one replication step, so
    /// peers never observe a partial group.
    async fn set_app_many(&self, pairs: &[(&str, String)]) -> Result<()>;
}
