//! In-memory relation store, shared between simulated units in tests.

use crate::error::Result;
use crate::relation::RelationStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Shared {
    app: HashMap<String, String>,
    units: HashMap<String, HashMap<String, String>>,
}

/// In-memory implementation of [`RelationStore`].
///
/// One [`Shared`] bucket models the replicated relation; `view_as` produces
/// a handle scoped to a particular unit so several simulated units can
/// read and write the same relation.
#[derive(Clone)]
pub struct InMemoryRelation {
    shared: Arc<Mutex<Shared>>,
    local_unit: String,
}

impl InMemoryRelation {
    pub fn new(local_unit: &str) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            local_unit: local_unit.to_string(),
        }
    }

    /// A handle to the same relation as seen from another unit.
    pub fn view_as(&self, unit: &str) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            local_unit: unit.to_string(),
        }
    }

    /// Seed another unit's data, standing in for the platform writing
    /// keys like `ingress-address`.
    pub fn seed_unit(&self, unit: &str, key: &str, value: &str) {
        let mut shared = self.shared.lock().unwrap();
        shared
            .units
            .entry(unit.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Drop a unit from the relation, as the platform does on departure.
    pub fn remove_unit(&self, unit: &str) {
        self.shared.lock().unwrap().units.remove(unit);
    }
}

#[async_trait]
impl RelationStore for InMemoryRelation {
    fn local_unit(&self) -> &str {
        &self.local_unit
    }

    async fn list_units(&self) -> Result<Vec<String>> {
        let shared = self.shared.lock().unwrap();
        let mut units: Vec<String> = shared
            .units
            .keys()
            .filter(|u| *u != &self.local_unit)
            .cloned()
            .collect();
        units.sort();
        Ok(units)
    }

    async fn get_unit(&self, unit: &str, key: &str) -> Result<Option<String>> {
        let shared = self.shared.lock().unwrap();
        Ok(shared.units.get(unit).and_then(|m| m.get(key)).cloned())
    }

    async fn set_unit(&self, key: &str, value: &str) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared
            .units
            .entry(self.local_unit.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_app(&self, key: &str) -> Result<Option<String>> {
        let shared = self.shared.lock().unwrap();
        Ok(shared.app.get(key).cloned())
    }

    async fn set_app(&self, key: &str, value: &str) -> Result<()> {
        self.set_app_many(&[(key, value.to_string())]).await
    }

    async fn set_app_many(&self, pairs: &[(&str, String)]) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        for (key, value) in pairs {
            shared.app.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }
}
