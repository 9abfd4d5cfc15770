//! One-shot upgrade of the legacy single-project session
//!
//! Older releases kept exactly one editing session as a JSON document of the
//! form `{selectedTemplateId, elements}` with images embedded inline as data
//! URLs. On startup that document (if any) is converted into a regular
//! project: inline images are detached into assets and replaced by
//! `srcAssetId` references.
//!
//! The completion flag and the legacy document live in the settings region
//! of the same database, so creating the project, storing its assets,
//! dropping the legacy document and setting the flag commit together. A
//! failure leaves everything as it was and the next launch retries.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data_url;
use crate::models::{now_millis, Element, NewProject, Page, ProjectId};
use crate::storage::database::{insert_asset, insert_project, put_project};
use crate::storage::{Database, SettingKey, Settings, StoreError, StoreResult};

/// Name given to the project created from a legacy session
pub const LEGACY_PROJECT_NAME: &str = "Legacy project";

/// Name of the single page of a migrated project
pub const LEGACY_PAGE_NAME: &str = "Main page";

/// What a migration run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The completion flag was already set; nothing was read or written
    AlreadyComplete,
    /// No legacy document existed; only the flag was set
    NothingToMigrate,
    /// A project was created from the legacy document
    Migrated(ProjectId),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySession {
    selected_template_id: i64,
    #[serde(default)]
    elements: Vec<Value>,
}

fn parse_session(raw: &str) -> StoreResult<LegacySession> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Validation(format!("legacy session is malformed: {}", e)))
}

/// Run the legacy migration if it has not completed yet
pub fn migrate_legacy_session(db: &mut Database) -> StoreResult<MigrationOutcome> {
    let raw = {
        let settings = db.settings();
        if settings.flag(SettingKey::MigrationComplete)? {
            return Ok(MigrationOutcome::AlreadyComplete);
        }

        match settings.get(SettingKey::LegacySession)? {
            Some(raw) => raw,
            None => {
                settings.set_flag(SettingKey::MigrationComplete)?;
                info!("No legacy session found, marking migration complete");
                return Ok(MigrationOutcome::NothingToMigrate);
            }
        }
    };

    let session = parse_session(&raw)?;
    info!(
        "Migrating legacy session ({} element(s), template {})",
        session.elements.len(),
        session.selected_template_id
    );

    let project_id = db.transaction("legacy migration", |tx| {
        let draft = NewProject {
            uuid: format!("migrated-{}", Uuid::new_v4()),
            name: LEGACY_PROJECT_NAME.to_string(),
            last_modified: now_millis(),
            pages: vec![Page::new(LEGACY_PAGE_NAME, session.selected_template_id)],
        };
        let project_id = insert_project(tx, &draft)?;

        let mut elements = Vec::with_capacity(session.elements.len());
        for value in &session.elements {
            if let Some(element) = migrate_element(tx, project_id, value)? {
                elements.push(element);
            }
        }

        let mut project = draft.into_project(project_id);
        project.pages[0].elements = elements;
        put_project(tx, &project)?;

        let settings = Settings::new(tx);
        settings.remove(SettingKey::LegacySession)?;
        settings.set_flag(SettingKey::MigrationComplete)?;
        Ok(project_id)
    })?;

    info!("Legacy migration complete, project {}", project_id);
    Ok(MigrationOutcome::Migrated(project_id))
}

/// Convert one legacy element
///
/// Image elements with inline `src` data get their payload stored as an
/// asset of `project_id`; everything else is decoded unchanged. An image
/// placeholder with neither inline data nor an asset reference is dropped.
fn migrate_element(
    conn: &rusqlite::Connection,
    project_id: ProjectId,
    value: &Value,
) -> StoreResult<Option<Element>> {
    let is_image = value.get("type").and_then(Value::as_str) == Some("image");
    let inline = value
        .get("src")
        .and_then(Value::as_str)
        .filter(|src| !src.trim().is_empty());

    let value = match (is_image, inline) {
        (true, Some(src)) => {
            let blob = data_url::decode(src)?;
            let asset_id = insert_asset(conn, project_id, &blob)?;

            let mut replaced = value.clone();
            if let Some(obj) = replaced.as_object_mut() {
                obj.remove("src");
                obj.insert("srcAssetId".to_string(), Value::from(asset_id));
            }
            replaced
        }
        (true, None) if value.get("srcAssetId").is_none() => {
            let id = value.get("id").and_then(Value::as_str).unwrap_or("?");
            warn!("Dropping legacy image element {} without image data", id);
            return Ok(None);
        }
        _ => value.clone(),
    };

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| StoreError::Validation(format!("legacy element is malformed: {}", e)))
}

/// Place a legacy session document into the settings region
///
/// The document is validated first. It is only picked up while the
/// completion flag is unset.
pub fn stash_legacy_session(db: &Database, raw: &str) -> StoreResult<()> {
    parse_session(raw)?;
    db.settings().set(SettingKey::LegacySession, raw)
}
