//! Maintenance command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use invite_core::{MigrationOutcome, Store};

use crate::commands::user_facing;
use crate::output::Output;

/// Run the legacy migration now
///
/// Failures are reported generically; details go to the debug log.
pub fn migrate(store: &mut Store, output: &Output) -> Result<()> {
    let outcome = store.run_migration().map_err(|e| {
        debug!("Legacy migration failed: {:#}", e);
        anyhow::anyhow!(
            "{} (set RUST_LOG=debug for details)",
            user_facing(&e, "Migration failed, it will be retried on next launch")
        )
    })?;

    let (summary, project) = match outcome {
        MigrationOutcome::AlreadyComplete => ("Migration already completed".to_string(), None),
        MigrationOutcome::NothingToMigrate => ("No legacy session to migrate".to_string(), None),
        MigrationOutcome::Migrated(id) => (format!("Migrated legacy session into project {}", id), Some(id)),
    };
    output.print_report(
        &summary,
        &serde_json::json!({"outcome": format!("{:?}", outcome), "project": project}),
    );
    Ok(())
}

/// Remove orphaned assets now
pub fn sweep(store: &mut Store, output: &Output) -> Result<()> {
    let report = store.sweep()?;
    output.print_report(
        &format!(
            "Scanned {} asset(s), removed {} orphan(s)",
            report.scanned, report.removed
        ),
        &report,
    );
    Ok(())
}

/// Load a legacy session file so the next migration picks it up
///
/// With `--reset` the completion flag is cleared first.
pub fn stash_legacy(store: &Store, file: PathBuf, reset: bool, output: &Output) -> Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read legacy session {:?}", file))?;

    if reset {
        store.reset_settings()?;
    }
    store.stash_legacy_session(&raw)?;

    output.success("Legacy session stored; run `invite maintenance migrate` to convert it");
    Ok(())
}
