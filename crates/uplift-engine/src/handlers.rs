use anyhow::Result;
use uplift_core::{Channel, ContentItem, EarningsSummary, MigrationKind, NotificationKind};
use uplift_store::{current_unix_timestamp, keys, StateStore};

use crate::notify::push_notification;

const DEFAULT_NICHE: &str = "general";
const BASE_DAILY_EARNINGS_PER_CHANNEL: f64 = 15.50;

/// Dispatches a migration kind to its builtin routine.
///
/// Every routine treats missing collections as empty and is safe to run
/// more than once: rollback and crash recovery both re-invoke migrations
/// whose effects may already be in place.
pub fn run_builtin_migration<S: StateStore>(kind: MigrationKind, store: &mut S) -> Result<()> {
    match kind {
        MigrationKind::EnsureChannelDefaults => ensure_channel_defaults(store),
        MigrationKind::BootstrapStarterContent => bootstrap_starter_content(store),
    }
}

fn read_channels<S: StateStore>(store: &S) -> Result<Vec<Channel>> {
    Ok(store.get_doc(keys::CHANNELS)?.unwrap_or_default())
}

/// Fills derived fields missing from existing channels: a voice matched
/// to the channel's niche, a default niche, and a creation timestamp.
fn ensure_channel_defaults<S: StateStore>(store: &mut S) -> Result<()> {
    let mut channels = read_channels(store)?;
    if channels.is_empty() {
        return Ok(());
    }

    let now = current_unix_timestamp()?;
    let mut upgraded = 0;
    for channel in &mut channels {
        let mut changed = false;
        if channel.voice_id.is_none() {
            channel.voice_id = Some(select_voice(channel.niche.as_deref()).to_string());
            changed = true;
        }
        if channel.niche.is_none() {
            channel.niche = Some(DEFAULT_NICHE.to_string());
            changed = true;
        }
        if channel.created_at_unix.is_none() {
            channel.created_at_unix = Some(now);
            changed = true;
        }
        if changed {
            upgraded += 1;
        }
    }

    if upgraded > 0 {
        store.set_doc(keys::CHANNELS, &channels)?;
        push_notification(
            store,
            NotificationKind::Success,
            &format!("Upgraded {upgraded} channel(s) with voices and default metadata"),
        )?;
    }

    Ok(())
}

/// Generates one welcome item for every channel without content and
/// seeds the autopilot flag and earnings figures on first run.
fn bootstrap_starter_content<S: StateStore>(store: &mut S) -> Result<()> {
    let channels = read_channels(store)?;
    let mut content: Vec<ContentItem> = store.get_doc(keys::CONTENT)?.unwrap_or_default();
    let now = current_unix_timestamp()?;

    let mut created = 0;
    for channel in &channels {
        if content.iter().any(|item| item.channel_id == channel.id) {
            continue;
        }
        content.push(ContentItem {
            id: format!("starter-{}", channel.id),
            channel_id: channel.id.clone(),
            title: format!("Welcome to {}", channel.name),
            created_at_unix: now,
        });
        created += 1;
    }
    if created > 0 {
        store.set_doc(keys::CONTENT, &content)?;
    }

    if store.get(keys::AUTOPILOT)?.is_none() {
        store.set_doc(keys::AUTOPILOT, &false)?;
    }

    if store.get(keys::EARNINGS)?.is_none() {
        let base = channels.len() as f64 * BASE_DAILY_EARNINGS_PER_CHANNEL;
        store.set_doc(
            keys::EARNINGS,
            &EarningsSummary {
                today: base,
                week: base * 7.0,
                month: base * 30.0,
                last_update_unix: now,
            },
        )?;
    }

    Ok(())
}

fn select_voice(niche: Option<&str>) -> &'static str {
    let niche = niche.unwrap_or_default().to_ascii_lowercase();
    if niche.contains("finance") || niche.contains("money") {
        "voice-authoritative"
    } else if niche.contains("tech") || niche.contains("science") {
        "voice-analyst"
    } else if niche.contains("story") || niche.contains("history") {
        "voice-storyteller"
    } else if niche.contains("health") || niche.contains("fitness") {
        "voice-coach"
    } else {
        "voice-narrator"
    }
}

#[cfg(test)]
pub(crate) fn default_voice() -> &'static str {
    select_voice(None)
}
