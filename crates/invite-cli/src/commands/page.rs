//! Page command handlers

use anyhow::Result;

use invite_core::{ProjectId, Store};

use crate::output::Output;
use crate::prompt::confirm_destructive;

/// Append a page; it inherits the template of the first page
pub fn add(store: &Store, project: ProjectId, name: Option<String>, output: &Output) -> Result<()> {
    let page = store.add_page(project, name)?;
    if output.should_prompt() {
        output.success(&format!("Added page '{}' to project {}", page.name, project));
    }
    output.print_page(&page);
    Ok(())
}

pub fn rename(
    store: &Store,
    project: ProjectId,
    page: String,
    name: String,
    output: &Output,
) -> Result<()> {
    store.rename_page(project, &page, &name)?;
    output.success(&format!("Renamed page {} to '{}'", page, name));
    Ok(())
}

/// Delete a page with all of its elements
pub fn delete(
    store: &Store,
    project: ProjectId,
    page: String,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let current = store.require_project(project)?;
    let Some(existing) = current.page(&page) else {
        return Err(invite_core::EditError::PageNotFound(page).into());
    };

    let description = format!(
        "Delete page: {} - {} ({} element(s))",
        existing.id,
        existing.name,
        existing.elements.len()
    );
    if !confirm_destructive(&description, yes, output)? {
        return Ok(());
    }

    let removed = store.remove_page(project, &page)?;
    output.success(&format!("Deleted page {}", removed.id));
    Ok(())
}
