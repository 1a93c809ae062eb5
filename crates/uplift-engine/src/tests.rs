use anyhow::{anyhow, Result};
use serde_json::json;
use uplift_core::{
    Channel, EarningsSummary, MigrationKind, Notification, NotificationKind, SnapshotDocument,
    Version, VersionDescriptor, VersionRegistry,
};
use uplift_store::{keys, MemoryStore, StateStore};

use super::*;

fn version(raw: &str) -> Version {
    raw.parse().expect("version must parse")
}

fn release(raw: &str, features: &[&str], migration: Option<MigrationKind>) -> VersionDescriptor {
    VersionDescriptor {
        version: version(raw),
        release_label: String::new(),
        features: features.iter().map(|feature| feature.to_string()).collect(),
        migration,
    }
}

/// A no-op marker release followed by two migration-bearing releases.
fn sample_registry() -> VersionRegistry {
    VersionRegistry::new(vec![
        release("1.0.0", &["basic"], None),
        release("1.5.0", &["voices"], Some(MigrationKind::EnsureChannelDefaults)),
        release("2.0.0", &["autopilot"], Some(MigrationKind::BootstrapStarterContent)),
    ])
    .expect("sample registry must build")
}

fn three_migration_registry() -> VersionRegistry {
    VersionRegistry::new(vec![
        release("1.1.0", &["first"], Some(MigrationKind::EnsureChannelDefaults)),
        release("1.2.0", &["second"], Some(MigrationKind::BootstrapStarterContent)),
        release("2.0.0", &["third"], Some(MigrationKind::EnsureChannelDefaults)),
    ])
    .expect("registry must build")
}

fn channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        niche: None,
        voice_id: None,
        created_at_unix: None,
    }
}

fn apply(
    store: &mut MemoryStore,
    registry: &VersionRegistry,
    run: &mut dyn FnMut(MigrationKind, &mut MemoryStore) -> Result<()>,
) -> MigrationReport {
    Orchestrator::new(store, registry)
        .apply_pending_migrations(run)
        .expect("migration pass must complete")
}

fn notifications(store: &MemoryStore) -> Vec<Notification> {
    store
        .get_doc(keys::NOTIFICATIONS)
        .expect("notifications must decode")
        .unwrap_or_default()
}

fn persisted_version(store: &MemoryStore) -> Option<String> {
    store
        .get_doc(keys::VERSION)
        .expect("version record must decode")
}

#[test]
fn check_for_updates_reports_pending_features_for_new_client() {
    let store = MemoryStore::new();
    let registry = sample_registry();
    let mut probe = store.clone();
    let orchestrator = Orchestrator::new(&mut probe, &registry);

    let check = orchestrator.check_for_updates().expect("check must succeed");
    assert!(check.update_available);
    assert_eq!(check.current_version, version("1.0.0"));
    assert_eq!(check.latest_version, version("2.0.0"));
    assert_eq!(check.new_features, vec!["basic", "voices", "autopilot"]);

    // Read-only: nothing was written.
    assert_eq!(probe, store);
}

#[test]
fn check_for_updates_when_current_reports_nothing_pending() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    let registry = sample_registry();
    let orchestrator = Orchestrator::new(&mut store, &registry);

    let check = orchestrator.check_for_updates().expect("check must succeed");
    assert!(!check.update_available);
    assert!(check.new_features.is_empty());
}

#[test]
fn pass_is_noop_when_already_at_target() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    let registry = sample_registry();
    let before = store.clone();

    let mut calls = 0;
    let report = apply(&mut store, &registry, &mut |_, _| {
        calls += 1;
        Ok(())
    });

    assert!(!report.updated);
    assert_eq!(report.from_version, version("2.0.0"));
    assert_eq!(report.to_version, version("2.0.0"));
    assert_eq!(calls, 0);
    // No store writes and no notification on the no-op path.
    assert_eq!(store, before);
}

#[test]
fn pass_does_not_rewind_a_version_past_the_registry_target() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("3.0.0"))
        .expect("must seed version");
    let registry = sample_registry();
    let before = store.clone();

    let report = apply(&mut store, &registry, &mut |_, _| Ok(()));
    assert!(!report.updated);
    assert_eq!(store, before);
}

#[test]
fn migrations_run_in_ascending_registry_order() {
    let mut store = MemoryStore::new();
    let registry = three_migration_registry();

    let mut log = Vec::new();
    let report = apply(&mut store, &registry, &mut |kind, _| {
        log.push(kind);
        Ok(())
    });

    assert_eq!(
        log,
        vec![
            MigrationKind::EnsureChannelDefaults,
            MigrationKind::BootstrapStarterContent,
            MigrationKind::EnsureChannelDefaults,
        ]
    );
    assert!(report.updated);
    assert_eq!(report.new_features, vec!["first", "second", "third"]);
}

#[test]
fn failing_migration_is_recorded_and_later_ones_still_run() {
    let mut store = MemoryStore::new();
    let registry = three_migration_registry();

    let mut log = Vec::new();
    let report = apply(&mut store, &registry, &mut |kind, _| {
        log.push(kind);
        if kind == MigrationKind::BootstrapStarterContent {
            return Err(anyhow!("content backfill exploded"));
        }
        Ok(())
    });

    assert_eq!(log.len(), 3, "the failure must not abort the loop");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].version, version("1.2.0"));
    assert!(report.errors[0].detail.contains("content backfill exploded"));
    // Features of the failed release are not reported as applied.
    assert_eq!(report.new_features, vec!["first", "third"]);
    // The version record advances regardless: attempted once, not retried.
    assert_eq!(persisted_version(&mut store).as_deref(), Some("2.0.0"));

    let listed = notifications(&store);
    assert!(listed
        .iter()
        .any(|notification| notification.kind == NotificationKind::Warning));
}

#[test]
fn version_record_advances_even_when_every_migration_fails() {
    let mut store = MemoryStore::new();
    let registry = three_migration_registry();

    let report = apply(&mut store, &registry, &mut |_, _| {
        Err(anyhow!("store is haunted"))
    });

    assert!(report.updated);
    assert_eq!(report.errors.len(), 3);
    assert!(report.new_features.is_empty());
    assert_eq!(persisted_version(&mut store).as_deref(), Some("2.0.0"));
}

#[test]
fn example_scenario_end_to_end() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    let registry = sample_registry();

    let report = apply(&mut store, &registry, &mut |kind, store| run_builtin_migration(kind, store));

    assert!(report.updated);
    assert_eq!(report.from_version, version("1.0.0"));
    assert_eq!(report.to_version, version("2.0.0"));
    assert_eq!(report.new_features, vec!["basic", "voices", "autopilot"]);
    assert!(report.errors.is_empty());

    assert_eq!(persisted_version(&mut store).as_deref(), Some("2.0.0"));
    let last_update: Option<u64> = store.get_doc(keys::LAST_UPDATE).expect("must decode");
    assert!(last_update.is_some());

    let channels: Vec<Channel> = store
        .get_doc(keys::CHANNELS)
        .expect("channels must decode")
        .expect("channels must exist");
    assert_eq!(channels[0].niche.as_deref(), Some("general"));
    assert!(channels[0].voice_id.is_some());
    assert!(channels[0].created_at_unix.is_some());

    let autopilot: Option<bool> = store.get_doc(keys::AUTOPILOT).expect("must decode");
    assert_eq!(autopilot, Some(false));
    let earnings: EarningsSummary = store
        .get_doc(keys::EARNINGS)
        .expect("earnings must decode")
        .expect("earnings must be seeded");
    assert!((earnings.today - 15.50).abs() < f64::EPSILON);

    let listed = notifications(&store);
    let update_notice = listed
        .iter()
        .find(|notification| notification.message.starts_with("Updated to v2.0.0"))
        .expect("update notice must be emitted");
    assert_eq!(update_notice.kind, NotificationKind::Success);
}

#[test]
fn repeated_pass_after_update_is_a_noop() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    let registry = sample_registry();

    apply(&mut store, &registry, &mut |kind, store| run_builtin_migration(kind, store));
    let after_first = store.clone();

    let report = apply(&mut store, &registry, &mut |kind, store| run_builtin_migration(kind, store));
    assert!(!report.updated);
    assert_eq!(store, after_first);
}

#[test]
fn update_notice_truncates_long_feature_lists() {
    let mut store = MemoryStore::new();
    let registry = VersionRegistry::new(vec![release(
        "1.1.0",
        &["one", "two", "three", "four", "five"],
        None,
    )])
    .expect("registry must build");

    apply(&mut store, &registry, &mut |_, _| Ok(()));

    let listed = notifications(&store);
    assert_eq!(
        listed[0].message,
        "Updated to v1.1.0! New: one, two, three (+2 more)"
    );
}

#[test]
fn force_recheck_reruns_migrations_from_baseline() {
    let mut store = MemoryStore::new();
    let registry = sample_registry();
    apply(&mut store, &registry, &mut |kind, store| run_builtin_migration(kind, store));

    let mut log = Vec::new();
    let report = Orchestrator::new(&mut store, &registry)
        .force_recheck(&mut |kind, _| {
            log.push(kind);
            Ok(())
        })
        .expect("recheck must complete");

    assert!(report.updated);
    assert_eq!(report.from_version, version("1.0.0"));
    assert_eq!(
        log,
        vec![
            MigrationKind::EnsureChannelDefaults,
            MigrationKind::BootstrapStarterContent,
        ]
    );
}

#[test]
fn corrupt_version_record_surfaces_as_an_error() {
    let mut store = MemoryStore::new();
    store
        .set(keys::VERSION, json!("not.a.version"))
        .expect("must seed raw value");
    let registry = sample_registry();

    let err = Orchestrator::new(&mut store, &registry)
        .apply_pending_migrations(&mut |_, _| Ok(()))
        .expect_err("malformed record must fail fast");
    assert!(format!("{err:#}").contains("non-numeric segment"));
}

#[test]
fn export_then_import_leaves_the_store_unchanged() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    store
        .set_doc(keys::AUTOPILOT, &true)
        .expect("must seed autopilot");
    push_notification(&mut store, NotificationKind::Success, "seeded")
        .expect("must seed notification");
    let before = store.clone();

    let mut service = SnapshotService::new(&mut store);
    let document = service.export_snapshot().expect("export must succeed");
    let imported = service.import_snapshot(&document).expect("import must succeed");

    assert!(imported);
    assert_eq!(store, before);
}

#[test]
fn import_restores_domains_into_a_fresh_store() {
    let mut source = MemoryStore::new();
    source
        .set_doc(keys::VERSION, &version("1.5.0"))
        .expect("must seed version");
    source
        .set_doc(keys::CHANNELS, &vec![channel("ch-9", "History Lab")])
        .expect("must seed channels");
    let document = SnapshotService::new(&mut source)
        .export_snapshot()
        .expect("export must succeed");

    let mut fresh = MemoryStore::new();
    let imported = SnapshotService::new(&mut fresh)
        .import_snapshot(&document)
        .expect("import must succeed");

    assert!(imported);
    assert_eq!(persisted_version(&mut fresh).as_deref(), Some("1.5.0"));
    let channels: Vec<Channel> = fresh
        .get_doc(keys::CHANNELS)
        .expect("channels must decode")
        .expect("channels must exist");
    assert_eq!(channels[0].id, "ch-9");
}

#[test]
fn import_rejects_document_missing_version_without_mutating() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    let before = store.clone();

    let document = SnapshotDocument {
        version: None,
        exported_at_unix: 1,
        channels: Some(Vec::new()),
        content: None,
        earnings: None,
        autopilot: None,
        notifications: None,
    };
    let imported = SnapshotService::new(&mut store)
        .import_snapshot(&document)
        .expect("import must not error");

    assert!(!imported);
    assert_eq!(store, before);
}

#[test]
fn import_leaves_domains_absent_from_the_document_untouched() {
    let mut store = MemoryStore::new();
    store
        .set_doc(
            keys::EARNINGS,
            &EarningsSummary {
                today: 31.0,
                week: 217.0,
                month: 930.0,
                last_update_unix: 10,
            },
        )
        .expect("must seed earnings");

    let document = SnapshotDocument {
        version: Some(version("1.5.0")),
        exported_at_unix: 1,
        channels: Some(vec![channel("ch-2", "Tech Brief")]),
        content: None,
        earnings: None,
        autopilot: None,
        notifications: None,
    };
    let imported = SnapshotService::new(&mut store)
        .import_snapshot(&document)
        .expect("import must succeed");

    assert!(imported);
    let earnings: EarningsSummary = store
        .get_doc(keys::EARNINGS)
        .expect("earnings must decode")
        .expect("earnings must survive the import");
    assert!((earnings.today - 31.0).abs() < f64::EPSILON);
    assert_eq!(persisted_version(&mut store).as_deref(), Some("1.5.0"));
}

#[test]
fn rollback_rewinds_the_pointer_and_retriggers_migrations() {
    let mut store = MemoryStore::new();
    let registry = sample_registry();
    apply(&mut store, &registry, &mut |kind, store| run_builtin_migration(kind, store));
    assert_eq!(persisted_version(&mut store).as_deref(), Some("2.0.0"));

    SnapshotService::new(&mut store)
        .rollback(&version("1.0.0"))
        .expect("rollback must succeed");

    assert_eq!(persisted_version(&mut store).as_deref(), Some("1.0.0"));
    let rollback_at: Option<u64> = store.get_doc(keys::ROLLBACK_AT).expect("must decode");
    assert!(rollback_at.is_some());
    assert_eq!(notifications(&store)[0].kind, NotificationKind::Warning);

    let mut log = Vec::new();
    apply(&mut store, &registry, &mut |kind, _| {
        log.push(kind);
        Ok(())
    });
    assert_eq!(
        log,
        vec![
            MigrationKind::EnsureChannelDefaults,
            MigrationKind::BootstrapStarterContent,
        ]
    );
}

#[test]
fn rollback_target_is_not_validated_against_the_registry() {
    let mut store = MemoryStore::new();
    SnapshotService::new(&mut store)
        .rollback(&version("0.9.9"))
        .expect("rollback must succeed");
    assert_eq!(persisted_version(&mut store).as_deref(), Some("0.9.9"));
}

#[test]
fn factory_reset_declined_at_first_prompt_changes_nothing() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    let before = store.clone();

    let mut prompts = Vec::new();
    let proceeded = SnapshotService::new(&mut store)
        .factory_reset(&mut |prompt| {
            prompts.push(prompt);
            false
        })
        .expect("reset must not error");

    assert!(!proceeded);
    assert_eq!(prompts, vec![ResetPrompt::DeleteEverything]);
    assert_eq!(store, before);
}

#[test]
fn factory_reset_declined_at_second_prompt_changes_nothing() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    let before = store.clone();

    let mut prompts = Vec::new();
    let proceeded = SnapshotService::new(&mut store)
        .factory_reset(&mut |prompt| {
            prompts.push(prompt);
            prompt == ResetPrompt::DeleteEverything
        })
        .expect("reset must not error");

    assert!(!proceeded);
    assert_eq!(
        prompts,
        vec![ResetPrompt::DeleteEverything, ResetPrompt::CannotBeUndone]
    );
    assert_eq!(store, before);
}

#[test]
fn factory_reset_clears_state_but_retains_a_backup() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::VERSION, &version("2.0.0"))
        .expect("must seed version");
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    store
        .set_doc(keys::AUTOPILOT, &true)
        .expect("must seed autopilot");

    let proceeded = SnapshotService::new(&mut store)
        .factory_reset(&mut |_| true)
        .expect("reset must succeed");
    assert!(proceeded);

    let remaining = store.keys().expect("must list keys");
    let backup_key = remaining
        .iter()
        .find(|key| key.starts_with(keys::BACKUP_PREFIX))
        .expect("backup entry must be retained")
        .clone();
    // Only the backup and the reset notification survive.
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&keys::NOTIFICATIONS.to_string()));
    assert_eq!(store.get(keys::AUTOPILOT).expect("must read"), None);
    assert_eq!(persisted_version(&mut store), None);

    let backup: SnapshotDocument = store
        .get_doc(&backup_key)
        .expect("backup must decode")
        .expect("backup must exist");
    assert_eq!(backup.version, Some(version("2.0.0")));
    assert_eq!(
        backup.channels.as_ref().map(|channels| channels.len()),
        Some(1)
    );

    assert!(notifications(&store)[0]
        .message
        .contains(&backup_key));
}

#[test]
fn ensure_channel_defaults_is_idempotent() {
    let mut store = MemoryStore::new();
    store
        .set_doc(
            keys::CHANNELS,
            &vec![channel("ch-1", "Money Minute"), channel("ch-2", "Storytime")],
        )
        .expect("must seed channels");

    run_builtin_migration(MigrationKind::EnsureChannelDefaults, &mut store)
        .expect("first run must succeed");
    let after_first = store.clone();

    run_builtin_migration(MigrationKind::EnsureChannelDefaults, &mut store)
        .expect("second run must succeed");
    assert_eq!(store, after_first, "second run must change nothing");

    let channels: Vec<Channel> = store
        .get_doc(keys::CHANNELS)
        .expect("channels must decode")
        .expect("channels must exist");
    for stored in &channels {
        assert!(stored.voice_id.is_some());
        assert!(stored.niche.is_some());
        assert!(stored.created_at_unix.is_some());
    }
}

#[test]
fn ensure_channel_defaults_matches_voice_to_niche() {
    let mut store = MemoryStore::new();
    let mut finance = channel("ch-1", "Money Minute");
    finance.niche = Some("Personal Finance".to_string());
    store
        .set_doc(keys::CHANNELS, &vec![finance, channel("ch-2", "Misc")])
        .expect("must seed channels");

    run_builtin_migration(MigrationKind::EnsureChannelDefaults, &mut store)
        .expect("run must succeed");

    let channels: Vec<Channel> = store
        .get_doc(keys::CHANNELS)
        .expect("channels must decode")
        .expect("channels must exist");
    assert_eq!(channels[0].voice_id.as_deref(), Some("voice-authoritative"));
    assert_eq!(
        channels[1].voice_id.as_deref(),
        Some(super::handlers::default_voice())
    );
}

#[test]
fn bootstrap_starter_content_keeps_existing_state() {
    let mut store = MemoryStore::new();
    store
        .set_doc(keys::CHANNELS, &vec![channel("ch-1", "Daily Finance")])
        .expect("must seed channels");
    store
        .set_doc(keys::AUTOPILOT, &true)
        .expect("must seed autopilot");

    run_builtin_migration(MigrationKind::BootstrapStarterContent, &mut store)
        .expect("run must succeed");

    // An operator-enabled flag is never reset to the default.
    let autopilot: Option<bool> = store.get_doc(keys::AUTOPILOT).expect("must decode");
    assert_eq!(autopilot, Some(true));

    let after_first = store.clone();
    run_builtin_migration(MigrationKind::BootstrapStarterContent, &mut store)
        .expect("second run must succeed");
    assert_eq!(store, after_first, "second run must change nothing");
}

#[test]
fn builtin_registry_targets_two_zero_zero() {
    let registry = default_registry().expect("builtin registry must build");
    assert_eq!(registry.target_version(), &version("2.0.0"));
    assert_eq!(registry.first_version(), &version("1.0.0"));
    assert!(registry.descriptors()[0].migration.is_none());
    assert!(registry.descriptors()[2].migration_required());
}
