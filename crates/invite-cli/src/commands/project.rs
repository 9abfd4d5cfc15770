//! Project command handlers

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::debug;

use invite_core::{ProjectId, Store};

use crate::commands::{underlying, user_facing};
use crate::output::Output;
use crate::prompt::confirm_destructive;

/// List all projects, most recently modified first
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let projects = store.list_projects()?;
    output.print_projects(&projects);
    Ok(())
}

/// Show a project with its pages and elements
pub fn show(store: &Store, id: ProjectId, output: &Output) -> Result<()> {
    let project = store.require_project(id)?;
    output.print_project(&project);
    Ok(())
}

/// Create a project with one blank page
pub fn create(store: &Store, name: String, template: i64, output: &Output) -> Result<()> {
    let project = store.create_project(&name, template)?;
    output.print_created(
        "project",
        &project.id.to_string(),
        serde_json::json!({"uuid": project.uuid, "name": project.name}),
    );
    Ok(())
}

pub fn rename(store: &Store, id: ProjectId, name: String, output: &Output) -> Result<()> {
    let project = store.rename_project(id, &name)?;
    output.success(&format!("Renamed project {} to '{}'", project.id, project.name));
    Ok(())
}

/// Delete a project and every asset it owns
pub fn delete(store: &mut Store, id: ProjectId, yes: bool, output: &Output) -> Result<()> {
    let project = store.require_project(id)?;

    let description = format!(
        "Delete project: {} - {} ({} page(s))",
        project.id,
        project.name,
        project.pages.len()
    );
    if !confirm_destructive(&description, yes, output)? {
        return Ok(());
    }

    let assets = store.delete_project(id)?;
    output.success(&format!(
        "Deleted project {} and {} asset(s)",
        id, assets
    ));
    Ok(())
}

/// Export a project to a `.invite.json` file
///
/// Failures are reported generically; details go to the debug log.
pub fn export(store: &Store, id: ProjectId, out: Option<PathBuf>, output: &Output) -> Result<()> {
    let dir = out.unwrap_or_else(|| PathBuf::from("."));

    match store.export_to_dir(id, &dir) {
        Ok(path) => {
            output.print_created(
                "export",
                &path.display().to_string(),
                serde_json::json!({"project": id}),
            );
            Ok(())
        }
        Err(e) => {
            debug!("Export of project {} failed: {:#}", id, e);
            Err(anyhow!(
                "{} (set RUST_LOG=debug for details)",
                user_facing(&e, "Export failed")
            ))
        }
    }
}

/// Import a project from an export file
///
/// The new project never replaces an existing one.
pub fn import(store: &mut Store, file: PathBuf, output: &Output) -> Result<()> {
    let outcome = store
        .import_file(&file)
        .map_err(|e| anyhow!("Import failed: {}", underlying(&e)))?;

    if !outcome.dangling.is_empty() {
        output.warning(&format!(
            "{} image reference(s) in the file had no matching asset",
            outcome.dangling.len()
        ));
    }
    output.print_created(
        "project",
        &outcome.project.id.to_string(),
        serde_json::json!({
            "uuid": outcome.project.uuid,
            "name": outcome.project.name,
            "assets": outcome.assets_imported,
            "dangling": outcome.dangling,
        }),
    );
    Ok(())
}
