use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use uplift_core::{SnapshotDocument, Version, VersionRegistry};
use uplift_engine::{
    default_registry, run_builtin_migration, MigrationReport, Orchestrator, SnapshotService,
    UpdateCheck,
};
use uplift_store::{current_unix_timestamp, keys, JsonFileStore, StateStore};

use crate::render::{
    current_output_style, print_section, render_status_line, MigrationProgress, OutputStyle,
};

pub(crate) fn default_state_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state root")?;
        return Ok(PathBuf::from(app_data).join("Uplift").join("state"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".uplift").join("state"))
}

pub(crate) fn open_store(state_root: Option<PathBuf>) -> Result<JsonFileStore> {
    let root = match state_root {
        Some(root) => root,
        None => default_state_root()?,
    };
    JsonFileStore::open(root)
}

pub(crate) fn load_registry(path: Option<&Path>) -> Result<VersionRegistry> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read registry file: {}", path.display()))?;
            VersionRegistry::from_toml_str(&raw)
                .with_context(|| format!("invalid registry file: {}", path.display()))
        }
        None => default_registry(),
    }
}

pub(crate) fn run_status(store: &mut JsonFileStore, registry: &VersionRegistry) -> Result<()> {
    let style = current_output_style();
    let last_update: Option<u64> = store.get_doc(keys::LAST_UPDATE)?;
    let check = Orchestrator::new(store, registry).check_for_updates()?;

    for line in format_status_lines(&check, last_update, style) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_update(store: &mut JsonFileStore, registry: &VersionRegistry) -> Result<()> {
    let style = current_output_style();
    print_section(style, "update");

    let mut orchestrator = Orchestrator::new(store, registry);
    let current = orchestrator.persisted_version()?;
    let total = registry
        .pending_since(&current)
        .filter(|descriptor| descriptor.migration_required())
        .count() as u64;

    let progress = MigrationProgress::start(style, total);
    let report = orchestrator.apply_pending_migrations(&mut |kind, store| {
        let outcome = run_builtin_migration(kind, store);
        progress.tick();
        outcome
    })?;
    progress.finish();

    for line in format_report_lines(&report, style) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_recheck(store: &mut JsonFileStore, registry: &VersionRegistry) -> Result<()> {
    let style = current_output_style();
    print_section(style, "recheck");

    let total = registry
        .descriptors()
        .iter()
        .filter(|descriptor| descriptor.migration_required())
        .count() as u64;

    let progress = MigrationProgress::start(style, total);
    let report = Orchestrator::new(store, registry).force_recheck(&mut |kind, store| {
        let outcome = run_builtin_migration(kind, store);
        progress.tick();
        outcome
    })?;
    progress.finish();

    for line in format_report_lines(&report, style) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_export(store: &mut JsonFileStore, out: Option<PathBuf>) -> Result<()> {
    let style = current_output_style();
    let document = SnapshotService::new(store).export_snapshot()?;

    let path = match out {
        Some(path) => path,
        None => default_backup_path(current_unix_timestamp()?),
    };
    let content = serde_json::to_string_pretty(&document)
        .context("failed to serialize snapshot document")?;
    fs::write(&path, content)
        .with_context(|| format!("failed to write snapshot file: {}", path.display()))?;

    println!(
        "{}",
        render_status_line(style, "ok", &format!("exported snapshot to {}", path.display()))
    );
    Ok(())
}

pub(crate) fn run_import(store: &mut JsonFileStore, path: &Path) -> Result<()> {
    let style = current_output_style();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file: {}", path.display()))?;
    let document: SnapshotDocument = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse snapshot file: {}", path.display()))?;

    if !SnapshotService::new(store).import_snapshot(&document)? {
        return Err(anyhow!(
            "not a valid backup file: snapshot is missing the version record or the channel list"
        ));
    }

    println!(
        "{}",
        render_status_line(
            style,
            "ok",
            &format!("snapshot restored from {}", path.display())
        )
    );
    Ok(())
}

pub(crate) fn run_rollback(store: &mut JsonFileStore, version: &str) -> Result<()> {
    let style = current_output_style();
    let target: Version = version
        .parse()
        .with_context(|| format!("invalid rollback target '{version}'"))?;

    SnapshotService::new(store).rollback(&target)?;

    println!(
        "{}",
        render_status_line(
            style,
            "warn",
            &format!("rolled back to v{target}; the next update re-runs later migrations")
        )
    );
    Ok(())
}

pub(crate) fn run_reset(store: &mut JsonFileStore) -> Result<()> {
    let style = current_output_style();
    let proceeded = SnapshotService::new(store)
        .factory_reset(&mut |prompt| prompt_confirmation(prompt.message()).unwrap_or(false))?;

    if proceeded {
        println!(
            "{}",
            render_status_line(style, "ok", "factory reset complete; a backup entry was retained")
        );
    } else {
        println!("reset aborted");
    }
    Ok(())
}

pub(crate) fn run_doctor(store: &JsonFileStore, registry_path: Option<&Path>) -> Result<()> {
    let layout = store.layout();
    println!("state root: {}", layout.root().display());
    println!("version record: {}", layout.key_path(keys::VERSION).display());
    match registry_path {
        Some(path) => println!("registry: {}", path.display()),
        None => println!("registry: builtin release history"),
    }
    Ok(())
}

pub(crate) fn format_status_lines(
    check: &UpdateCheck,
    last_update_unix: Option<u64>,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![format!(
        "version: {} (latest {})",
        check.current_version, check.latest_version
    )];
    if let Some(timestamp) = last_update_unix {
        lines.push(format!("last update: {timestamp} (unix)"));
    }

    if check.update_available {
        lines.push(render_status_line(
            style,
            "warn",
            &format!(
                "update available: {} new feature(s)",
                check.new_features.len()
            ),
        ));
        for feature in &check.new_features {
            lines.push(format!("- {feature}"));
        }
    } else {
        lines.push(render_status_line(style, "ok", "up to date"));
    }

    lines
}

pub(crate) fn format_report_lines(report: &MigrationReport, style: OutputStyle) -> Vec<String> {
    if !report.updated {
        return vec![render_status_line(
            style,
            "ok",
            &format!("already up to date (v{})", report.from_version),
        )];
    }

    let mut lines = vec![render_status_line(
        style,
        "ok",
        &format!(
            "updated from v{} to v{}",
            report.from_version, report.to_version
        ),
    )];
    for feature in &report.new_features {
        lines.push(render_status_line(style, "step", &format!("new: {feature}")));
    }
    for error in &report.errors {
        lines.push(render_status_line(
            style,
            "err",
            &format!("migration {} failed: {}", error.version, error.detail),
        ));
    }
    if !report.errors.is_empty() {
        lines.push(render_status_line(
            style,
            "warn",
            &format!(
                "completed with {} failed migration step(s)",
                report.errors.len()
            ),
        ));
    }

    lines
}

pub(crate) fn default_backup_path(timestamp_unix: u64) -> PathBuf {
    PathBuf::from(format!("uplift-backup-{timestamp_unix}.json"))
}

pub(crate) fn parse_yes(input: &str) -> bool {
    let normalized = input.trim();
    normalized.eq_ignore_ascii_case("y") || normalized.eq_ignore_ascii_case("yes")
}

fn prompt_confirmation(message: &str) -> Result<bool> {
    print!("{message} [y/N]: ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(parse_yes(&answer))
}
