//! User-facing unit status, projected from lifecycle state.

use crate::state::LifecycleState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single visible status of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// A convergence condition is unmet; the reason says which.
    Blocked(String),
    /// A long operation is in progress (install, bootstrap, rendering).
    Maintenance(String),
    /// All conditions met; carries the workload version for display.
    Active(String),
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Blocked(reason) => write!(f, "blocked: {}", reason),
            UnitStatus::Maintenance(msg) => write!(f, "maintenance: {}", msg),
            UnitStatus::Active(version) => write!(f, "active: {}", version),
        }
    }
}

/// Project the visible status from lifecycle state.
///
/// Pure function, evaluated as a strict priority chain: the first unmet
/// condition wins. Never mutates state; the version string shown for an
/// active unit is whatever was last cached by an update-status event.
pub fn project(state: &LifecycleState) -> UnitStatus {
    if !state.fetched {
        UnitStatus::Blocked("Sync server not fetched.".to_string())
    } else if !state.initialized {
        UnitStatus::Blocked("Sync server not initialized.".to_string())
    } else if !state.web_server_configured {
        UnitStatus::Blocked("Web server not configured.".to_string())
    } else if !state.runtime_configured {
        UnitStatus::Blocked("Runtime not configured.".to_string())
    } else if !state.database_available {
        UnitStatus::Blocked("No database.".to_string())
    } else {
        match &state.workload_version {
            Some(version) => UnitStatus::Active(format!("Ready (version {})", version)),
            None => UnitStatus::Active("Ready".to_string()),
        }
    }
}
