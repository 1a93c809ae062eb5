use anyhow::{Context, Result};
use uplift_core::{MigrationKind, NotificationKind, Version, VersionRegistry};
use uplift_store::{current_unix_timestamp, keys, StateStore};

use crate::notify::push_notification;
use crate::{MigrationError, MigrationReport, UpdateCheck};

/// Walks the release registry and brings the persisted state forward.
///
/// Runs on every application load. Migration routines are dispatched
/// through the injected runner one at a time, never concurrently; later
/// releases may assume earlier ones already completed.
pub struct Orchestrator<'a, S: StateStore> {
    store: &'a mut S,
    registry: &'a VersionRegistry,
}

impl<'a, S: StateStore> Orchestrator<'a, S> {
    pub fn new(store: &'a mut S, registry: &'a VersionRegistry) -> Self {
        Self { store, registry }
    }

    /// The recorded version, defaulting to the baseline when absent.
    pub fn persisted_version(&self) -> Result<Version> {
        let recorded: Option<Version> = self
            .store
            .get_doc(keys::VERSION)
            .context("failed to read the persisted version record")?;
        Ok(recorded.unwrap_or_else(Version::baseline))
    }

    /// Read-only update check: no mutation, no error cases beyond store I/O.
    pub fn check_for_updates(&self) -> Result<UpdateCheck> {
        let current = self.persisted_version()?;
        let latest = self.registry.target_version().clone();

        let mut new_features = Vec::new();
        for descriptor in self.registry.pending_since(&current) {
            new_features.extend(descriptor.features.iter().cloned());
        }

        Ok(UpdateCheck {
            update_available: current < latest,
            current_version: current,
            latest_version: latest,
            new_features,
        })
    }

    /// Runs every pending migration in registry order.
    ///
    /// A failing routine is recorded and the loop continues; the version
    /// record is advanced to the registry target after the loop either
    /// way, so broken migrations are attempted once, not retried forever.
    pub fn apply_pending_migrations(
        &mut self,
        run: &mut dyn FnMut(MigrationKind, &mut S) -> Result<()>,
    ) -> Result<MigrationReport> {
        let from = self.persisted_version()?;
        let target = self.registry.target_version().clone();

        // Already current: repeated calls are no-ops with zero writes.
        if from >= target {
            return Ok(MigrationReport {
                updated: false,
                from_version: from.clone(),
                to_version: from,
                new_features: Vec::new(),
                errors: Vec::new(),
            });
        }

        let registry = self.registry;
        let mut new_features = Vec::new();
        let mut errors = Vec::new();

        for descriptor in registry.pending_since(&from) {
            match descriptor.migration {
                Some(kind) => match run(kind, &mut *self.store) {
                    Ok(()) => new_features.extend(descriptor.features.iter().cloned()),
                    Err(err) => errors.push(MigrationError {
                        version: descriptor.version.clone(),
                        detail: format!("{err:#}"),
                    }),
                },
                None => new_features.extend(descriptor.features.iter().cloned()),
            }
        }

        self.store.set_doc(keys::VERSION, &target)?;
        self.store
            .set_doc(keys::LAST_UPDATE, &current_unix_timestamp()?)?;

        push_notification(
            self.store,
            NotificationKind::Success,
            &update_notice(&target, &new_features),
        )?;
        if !errors.is_empty() {
            push_notification(
                self.store,
                NotificationKind::Warning,
                &format!(
                    "{} migration step(s) failed while updating to v{target}",
                    errors.len()
                ),
            )?;
        }

        Ok(MigrationReport {
            updated: true,
            from_version: from,
            to_version: target,
            new_features,
            errors,
        })
    }

    /// Clears the version record and re-runs the pass, as if this client
    /// had never been seen before. Manual/administrative use only.
    pub fn force_recheck(
        &mut self,
        run: &mut dyn FnMut(MigrationKind, &mut S) -> Result<()>,
    ) -> Result<MigrationReport> {
        self.store.remove(keys::VERSION)?;
        self.apply_pending_migrations(run)
    }
}

fn update_notice(target: &Version, features: &[String]) -> String {
    if features.is_empty() {
        return format!("Updated to v{target}");
    }

    let shown = features.len().min(3);
    let mut notice = format!("Updated to v{target}! New: {}", features[..shown].join(", "));
    if features.len() > shown {
        notice.push_str(&format!(" (+{} more)", features.len() - shown));
    }
    notice
}
