//! Relation access through the platform's hook tools.
//!
//! Each call shells out to `relation-ids`, `relation-list`, `relation-get`
//! or `relation-set`. The tools are only available inside a hook execution
//! context; outside one they fail, which surfaces as a relation error.

use crate::error::{Error, Result};
use crate::relation::RelationStore;
use async_trait::async_trait;
use tokio::process::Command;

/// Hook-tool backed implementation of [`RelationStore`].
pub struct HookToolRelation {
    relation_name: String,
    local_unit: String,
}

impl HookToolRelation {
    /// Create a store for the named relation (e.g. "cluster" or "db").
    ///
    /// The unit name is taken from the substrate's environment, falling
    /// back to a placeholder for out-of-hook invocations like `syncop
    /// status`.
    pub fn new(relation_name: &str) -> Self {
        let local_unit =
            std::env::var("JUJU_UNIT_NAME").unwrap_or_else(|_| "syncop/0".to_string());
        Self {
            relation_name: relation_name.to_string(),
            local_unit,
        }
    }

    /// Application name derived from the unit name ("syncop/0" becomes
    /// "syncop"); `relation-get --app` expects it in the unit position.
    fn application(&self) -> &str {
        self.local_unit
            .split('/')
            .next()
            .unwrap_or(&self.local_unit)
    }

    /// Resolve the relation id, preferring the id of the hook's own
    /// relation context when it matches.
    async fn relation_id(&self) -> Result<String> {
        if let Ok(id) = std::env::var("JUJU_RELATION_ID") {
            if id.starts_with(&self.relation_name) {
                return Ok(id);
            }
        }
        let out = run_tool(&["relation-ids", &self.relation_name, "--format=json"]).await?;
        let ids: Vec<String> = serde_json::from_str(&out)?;
        ids.into_iter().next().ok_or_else(|| {
            Error::Relation(format!("no relation named '{}'", self.relation_name))
        })
    }
}

#[async_trait]
impl RelationStore for HookToolRelation {
    fn local_unit(&self) -> &str {
        &self.local_unit
    }

    async fn list_units(&self) -> Result<Vec<String>> {
        let id = self.relation_id().await?;
        let out = run_tool(&["relation-list", "-r", &id, "--format=json"]).await?;
        let units: Vec<String> = serde_json::from_str(&out)?;
        Ok(units)
    }

    async fn get_unit(&self, unit: &str, key: &str) -> Result<Option<String>> {
        let id = self.relation_id().await?;
        let out = run_tool(&["relation-get", "-r", &id, key, unit, "--format=json"]).await?;
        let value: Option<String> = serde_json::from_str(&out)?;
        Ok(value)
    }

    async fn set_unit(&self, key: &str, value: &str) -> Result<()> {
        let id = self.relation_id().await?;
        let pair = format!("{}={}", key, value);
        run_tool(&["relation-set", "-r", &id, &pair]).await?;
        Ok(())
    }

    async fn get_app(&self, key: &str) -> Result<Option<String>> {
        let id = self.relation_id().await?;
        let app = self.application();
        let out = run_tool(&["relation-get", "-r", &id, "--app", key, app, "--format=json"])
            .await?;
        let value: Option<String> = serde_json::from_str(&out)?;
        Ok(value)
    }

    async fn set_app(&self, key: &str, value: &str) -> Result<()> {
        self.set_app_many(&[(key, value.to_string())]).await
    }

    async fn set_app_many(&self, pairs: &[(&str, String)]) -> Result<()> {
        let id = self.relation_id().await?;
        let mut args = vec![
            "relation-set".to_string(),
            "-r".to_string(),
            id,
            "--app".to_string(),
        ];
        for (key, value) in pairs {
            args.push(format!("{}={}", key, value));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(&arg_refs).await?;
        Ok(())
    }
}

/// Query the platform for this unit's leadership. Snapshotted once per
/// dispatch; never re-queried mid-handler.
pub async fn is_leader() -> Result<bool> {
    let out = run_tool(&["is-leader", "--format=json"]).await?;
    let leader: bool = serde_json::from_str(&out)?;
    Ok(leader)
}

async fn run_tool(args: &[&str]) -> Result<String> {
    let output = Command::new(args[0])
        .args(&args[1..])
        .output()
        .await
        .map_err(|e| Error::Relation(format!("failed to run {}: {}", args[0], e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Relation(format!(
            "{} failed: {}",
            args[0],
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
