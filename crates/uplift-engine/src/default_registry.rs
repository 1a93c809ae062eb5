use anyhow::{Context, Result};
use uplift_core::{MigrationKind, VersionDescriptor, VersionRegistry};

/// The release history this build ships with.
///
/// Entries are listed in ascending version order; `VersionRegistry::new`
/// rejects anything else at startup.
pub fn default_registry() -> Result<VersionRegistry> {
    let registry = VersionRegistry::new(vec![
        release(
            "1.0.0",
            "2025-11-10",
            &["Channel connection", "Content generation", "Basic dashboard"],
            None,
        )?,
        release(
            "1.5.0",
            "2025-11-11",
            &["Voice library", "Smart notifications", "Activity feed"],
            Some(MigrationKind::EnsureChannelDefaults),
        )?,
        release(
            "2.0.0",
            "2025-11-12",
            &[
                "Live earnings counter",
                "Autopilot mode",
                "Starter content generation",
                "Niche-matched voice selection",
            ],
            Some(MigrationKind::BootstrapStarterContent),
        )?,
    ])
    .context("builtin release history is invalid")?;

    Ok(registry)
}

fn release(
    version: &str,
    label: &str,
    features: &[&str],
    migration: Option<MigrationKind>,
) -> Result<VersionDescriptor> {
    Ok(VersionDescriptor {
        version: version
            .parse()
            .with_context(|| format!("invalid builtin release version '{version}'"))?,
        release_label: label.to_string(),
        features: features.iter().map(|feature| feature.to_string()).collect(),
        migration,
    })
}
