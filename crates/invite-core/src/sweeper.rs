//! Orphaned asset sweeper
//!
//! An asset is orphaned when its owning project no longer exists, e.g. after
//! an interrupted deletion in an older release. The sweep runs once per
//! startup and is safe to repeat.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::AssetId;
use crate::storage::database::{asset_owners, delete_assets, project_ids};
use crate::storage::{Database, StoreResult};

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Assets inspected
    pub scanned: usize,
    /// Orphaned assets deleted
    pub removed: usize,
}

/// Delete every asset whose owner is missing
///
/// Reading owners and deleting orphans happen in one IMMEDIATE transaction,
/// so a project created concurrently cannot lose a freshly stored asset.
pub fn sweep_orphaned_assets(db: &mut Database) -> StoreResult<SweepReport> {
    let report = db.transaction("orphan sweep", |tx| {
        let live: HashSet<_> = project_ids(tx)?.into_iter().collect();
        let owners = asset_owners(tx)?;

        let orphans: Vec<AssetId> = owners
            .iter()
            .filter(|(_, owner)| !live.contains(owner))
            .map(|(id, _)| *id)
            .collect();

        let removed = if orphans.is_empty() {
            0
        } else {
            delete_assets(tx, &orphans)?
        };

        Ok(SweepReport {
            scanned: owners.len(),
            removed,
        })
    })?;

    if report.removed > 0 {
        info!(
            "Removed {} orphaned asset(s) of {} scanned",
            report.removed, report.scanned
        );
    }
    Ok(report)
}

/// Startup variant: failures are logged and never propagate
pub fn run_safeguard_sweep(db: &mut Database) -> Option<SweepReport> {
    match sweep_orphaned_assets(db) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("Orphaned asset sweep failed: {}", e);
            None
        }
    }
}
