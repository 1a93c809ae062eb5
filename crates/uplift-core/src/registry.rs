use std::cmp::Ordering;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::version::Version;

/// Closed set of migration routines the engine knows how to run.
///
/// Descriptors reference routines by kind instead of carrying callbacks,
/// so a registry can be loaded from an operator-editable file and every
/// kind has a registered handler at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    /// Fill derived fields missing from existing channels.
    EnsureChannelDefaults,
    /// Generate starter content and seed feature state.
    BootstrapStarterContent,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnsureChannelDefaults => "ensure-channel-defaults",
            Self::BootstrapStarterContent => "bootstrap-starter-content",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ensure-channel-defaults" => Ok(Self::EnsureChannelDefaults),
            "bootstrap-starter-content" => Ok(Self::BootstrapStarterContent),
            _ => Err(anyhow!("unknown migration kind: {value}")),
        }
    }
}

/// One release entry: a version, its display label, the features it
/// introduces, and the migration it requires, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub version: Version,
    pub release_label: String,
    pub features: Vec<String>,
    pub migration: Option<MigrationKind>,
}

impl VersionDescriptor {
    pub fn migration_required(&self) -> bool {
        self.migration.is_some()
    }
}

/// Ordered, read-only release history. Construction rejects empty,
/// duplicate, or out-of-order entries; the registry never re-sorts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRegistry {
    descriptors: Vec<VersionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    release: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    version: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    features: Vec<String>,
    migration: Option<String>,
}

impl VersionRegistry {
    pub fn new(descriptors: Vec<VersionDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(anyhow!("version registry must contain at least one release"));
        }

        for pair in descriptors.windows(2) {
            match pair[0].version.cmp(&pair[1].version) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return Err(anyhow!(
                        "version registry lists '{}' more than once",
                        pair[1].version
                    ));
                }
                Ordering::Greater => {
                    return Err(anyhow!(
                        "version registry is out of order: '{}' listed after '{}'",
                        pair[1].version,
                        pair[0].version
                    ));
                }
            }
        }

        Ok(Self { descriptors })
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(input).context("failed to parse release registry")?;

        let mut descriptors = Vec::with_capacity(file.release.len());
        for entry in file.release {
            let version: Version = entry
                .version
                .parse()
                .with_context(|| format!("invalid release version '{}'", entry.version))?;
            let migration = match entry.migration.as_deref() {
                Some(kind) => Some(MigrationKind::parse(kind).with_context(|| {
                    format!("invalid migration for release '{}'", version)
                })?),
                None => None,
            };
            descriptors.push(VersionDescriptor {
                version,
                release_label: entry.label,
                features: entry.features,
                migration,
            });
        }

        Self::new(descriptors)
    }

    pub fn descriptors(&self) -> &[VersionDescriptor] {
        &self.descriptors
    }

    /// The last release's version: what the whole system upgrades toward.
    pub fn target_version(&self) -> &Version {
        // Construction guarantees at least one release.
        &self.descriptors[self.descriptors.len() - 1].version
    }

    pub fn first_version(&self) -> &Version {
        &self.descriptors[0].version
    }

    /// Releases strictly newer than `since`, in registry order.
    pub fn pending_since<'a>(
        &'a self,
        since: &'a Version,
    ) -> impl Iterator<Item = &'a VersionDescriptor> {
        self.descriptors
            .iter()
            .filter(move |descriptor| descriptor.version > *since)
    }
}
