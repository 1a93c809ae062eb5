use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use uplift_core::{Notification, NotificationKind};
use uplift_store::{keys, StateStore};

static NOTIFICATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Appends a structured event to the shared notification list, newest first.
pub fn push_notification<S: StateStore>(
    store: &mut S,
    kind: NotificationKind,
    message: &str,
) -> Result<Notification> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?;
    let seq = NOTIFICATION_SEQ.fetch_add(1, Ordering::SeqCst);

    let notification = Notification {
        id: format!("{}-{seq}", now.as_millis()),
        kind,
        message: message.to_string(),
        timestamp_unix: now.as_secs(),
    };

    let mut notifications: Vec<Notification> =
        store.get_doc(keys::NOTIFICATIONS)?.unwrap_or_default();
    notifications.insert(0, notification.clone());
    store.set_doc(keys::NOTIFICATIONS, &notifications)?;

    Ok(notification)
}
