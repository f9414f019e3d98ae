//! Persistent unit lifecycle state.
//!
//! The reconciler is restarted for every delivered event, so everything it
//! must remember lives in [`LifecycleState`], persisted by [`StateStore`] as
//! a single JSON document written atomically. There is no ambient global:
//! the state struct is loaded at dispatch time and passed into every handler.

mod store;
mod types;

pub use store::StateStore;
pub use types::{DatabaseConnection, LifecycleState};
