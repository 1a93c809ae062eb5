use anyhow::Result;
use uplift_core::{
    Channel, ContentItem, EarningsSummary, Notification, NotificationKind, SnapshotDocument,
    Version,
};
use uplift_store::{current_unix_timestamp, keys, StateStore};

use crate::notify::push_notification;

/// Confirmation steps a caller must acknowledge before a factory reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPrompt {
    DeleteEverything,
    CannotBeUndone,
}

impl ResetPrompt {
    pub fn message(&self) -> &'static str {
        match self {
            Self::DeleteEverything => "This will delete ALL locally stored data. Continue?",
            Self::CannotBeUndone => "This action cannot be undone. Delete everything?",
        }
    }
}

/// Manual backup/export/import/rollback operations over the same store
/// the orchestrator manages. Never invoked automatically.
pub struct SnapshotService<'a, S: StateStore> {
    store: &'a mut S,
}

impl<'a, S: StateStore> SnapshotService<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Assembles a portable document from the persisted domains.
    /// Read-only with respect to the store.
    pub fn export_snapshot(&self) -> Result<SnapshotDocument> {
        let version: Option<Version> = self.store.get_doc(keys::VERSION)?;
        let channels: Option<Vec<Channel>> = self.store.get_doc(keys::CHANNELS)?;
        let content: Option<Vec<ContentItem>> = self.store.get_doc(keys::CONTENT)?;
        let earnings: Option<EarningsSummary> = self.store.get_doc(keys::EARNINGS)?;
        let autopilot: Option<bool> = self.store.get_doc(keys::AUTOPILOT)?;
        let notifications: Option<Vec<Notification>> =
            self.store.get_doc(keys::NOTIFICATIONS)?;

        Ok(SnapshotDocument {
            version: Some(version.unwrap_or_else(Version::baseline)),
            exported_at_unix: current_unix_timestamp()?,
            channels: Some(channels.unwrap_or_default()),
            content,
            earnings,
            autopilot,
            notifications,
        })
    }

    /// Restores the domains present in the document; absent domains are
    /// left untouched. `Ok(false)` means the document is not a valid
    /// backup and nothing was written.
    pub fn import_snapshot(&mut self, document: &SnapshotDocument) -> Result<bool> {
        let (Some(version), Some(channels)) = (&document.version, &document.channels) else {
            return Ok(false);
        };

        self.store.set_doc(keys::VERSION, version)?;
        self.store.set_doc(keys::CHANNELS, channels)?;
        if let Some(content) = &document.content {
            self.store.set_doc(keys::CONTENT, content)?;
        }
        if let Some(earnings) = &document.earnings {
            self.store.set_doc(keys::EARNINGS, earnings)?;
        }
        if let Some(autopilot) = &document.autopilot {
            self.store.set_doc(keys::AUTOPILOT, autopilot)?;
        }
        if let Some(notifications) = &document.notifications {
            self.store.set_doc(keys::NOTIFICATIONS, notifications)?;
        }

        Ok(true)
    }

    /// Rewinds the version pointer without undoing any data-level effects.
    /// A later pass re-runs every migration above the target, so routines
    /// must stay safe to run more than once.
    pub fn rollback(&mut self, target: &Version) -> Result<()> {
        self.store.set_doc(keys::VERSION, target)?;
        self.store
            .set_doc(keys::ROLLBACK_AT, &current_unix_timestamp()?)?;
        push_notification(
            self.store,
            NotificationKind::Warning,
            &format!("Rolled back to v{target}. Some features may be unavailable."),
        )?;
        Ok(())
    }

    /// Destructive clear with a retained minimal backup.
    ///
    /// Both prompts must be acknowledged in order; declining either one
    /// returns `Ok(false)` before anything is written.
    pub fn factory_reset(
        &mut self,
        confirm: &mut dyn FnMut(ResetPrompt) -> bool,
    ) -> Result<bool> {
        if !confirm(ResetPrompt::DeleteEverything) {
            return Ok(false);
        }
        if !confirm(ResetPrompt::CannotBeUndone) {
            return Ok(false);
        }

        let now = current_unix_timestamp()?;
        let version: Option<Version> = self.store.get_doc(keys::VERSION)?;
        let channels: Option<Vec<Channel>> = self.store.get_doc(keys::CHANNELS)?;
        let backup = SnapshotDocument {
            version: Some(version.unwrap_or_else(Version::baseline)),
            exported_at_unix: now,
            channels: Some(channels.unwrap_or_default()),
            content: None,
            earnings: None,
            autopilot: None,
            notifications: None,
        };

        let backup_key = keys::backup(now);
        self.store.set_doc(&backup_key, &backup)?;

        for key in self.store.keys()? {
            if key != backup_key {
                self.store.remove(&key)?;
            }
        }

        push_notification(
            self.store,
            NotificationKind::Warning,
            &format!("Factory reset complete. Backup retained under '{backup_key}'."),
        )?;
        Ok(true)
    }
}
