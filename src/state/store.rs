use crate::error::{Error, Result};
use crate::state::LifecycleState;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// File-backed store for [`LifecycleState`].
///
/// The document is written to a temp file in the same directory and renamed
/// into place, so a crash mid-write never leaves a torn state file behind.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted state, or initialize defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed. A
    /// corrupt state file is not silently replaced; that would reset the
    /// unit's install guards.
    pub fn load_or_init(&self, default_data_dir: &Path) -> Result<LifecycleState> {
        if !self.path.exists() {
            tracing::debug!("No state file at {}, starting fresh", self.path.display());
            return Ok(LifecycleState::new(default_data_dir));
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::StateStore(format!("Could not read {}: {}", self.path.display(), e))
        })?;
        let state = serde_json::from_str(&contents).map_err(|e| {
            Error::StateStore(format!(
                "Corrupt state file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(state)
    }

    /// Persist the state atomically.
    pub fn save(&self, state: &mut LifecycleState) -> Result<()> {
        state.updated_at = Utc::now();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            Error::StateStore(format!(
                "Could not move state into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
