use uplift_core::Version;

mod default_registry;
mod handlers;
mod notify;
mod orchestrator;
mod snapshot;

pub use default_registry::default_registry;
pub use handlers::run_builtin_migration;
pub use notify::push_notification;
pub use orchestrator::Orchestrator;
pub use snapshot::{ResetPrompt, SnapshotService};

/// Read-only answer to "is there anything to apply?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub update_available: bool,
    pub current_version: Version,
    pub latest_version: Version,
    pub new_features: Vec<String>,
}

/// One failed migration step inside an otherwise-completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationError {
    pub version: Version,
    pub detail: String,
}

/// Outcome of a migration pass. `errors` is empty on a clean pass;
/// a non-empty list never aborts the pass (forward progress over
/// strict correctness).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub updated: bool,
    pub from_version: Version,
    pub to_version: Version,
    pub new_features: Vec<String>,
    pub errors: Vec<MigrationError>,
}

#[cfg(test)]
mod tests;
