//! Status command handler

use anyhow::Result;

use invite_core::{SettingKey, Store};

use crate::output::{Output, OutputFormat};

/// Show store location, record counts and migration state
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let db = store.database();
    let config = store.config();
    let projects = db.project_count()?;
    let assets = db.asset_count()?;
    let settings = db.settings();
    let migrated = settings.flag(SettingKey::MigrationComplete)?;
    let legacy_pending = settings.get(SettingKey::LegacySession)?.is_some();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": config.database_path(),
                    "counts": {
                        "projects": projects,
                        "assets": assets
                    },
                    "migration": {
                        "complete": migrated,
                        "legacy_pending": legacy_pending
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", projects);
        }
        OutputFormat::Human => {
            println!("Invite Status");
            println!("=============");
            println!();
            println!("Database: {}", config.database_path().display());
            println!();
            println!("Data:");
            println!("  Projects: {}", projects);
            println!("  Assets:   {}", assets);
            println!();
            println!("Legacy migration:");
            println!(
                "  Status: {}",
                if migrated { "complete" } else { "pending" }
            );
            if legacy_pending {
                println!("  A legacy session is waiting to be migrated");
            }
        }
    }

    Ok(())
}
