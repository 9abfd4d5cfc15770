//! Export/import of single projects
//!
//! An export document is a self-contained JSON file: the project tree minus
//! its store key, plus every asset the project owns encoded as a data URL and
//! tagged with the asset id it had in the exporting store.
//!
//! Import never touches existing records. The incoming project gets a fresh
//! uuid and a new store id, its assets are re-inserted under the new owner
//! and image references are rewritten through the old→new id mapping, all in
//! one transaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data_url;
use crate::models::{now_millis, AssetId, NewProject, Project, ProjectId};
use crate::storage::database::{assets_for_project, insert_asset, insert_project, put_project};
use crate::storage::{atomic_write, Database, StoreError, StoreResult};

/// The only export format this build reads and writes
pub const FILE_FORMAT_VERSION: &str = "1.0";

/// Written into `sourceApp` of every export
pub const SOURCE_APP: &str = "Invite Studio";

/// Appended to the name of every imported project
pub const IMPORT_SUFFIX: &str = " (Impor)";

/// Extension of export files
pub const EXPORT_EXTENSION: &str = ".invite.json";

/// Portable serialization of one project and its assets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub file_format_version: String,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub source_app: String,
    pub project: NewProject,
    pub assets: Vec<ExportedAsset>,
}

/// One asset inside an export document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAsset {
    /// Asset id in the exporting store, referenced by `srcAssetId`
    pub original_asset_id: AssetId,
    /// Base64 data URL of the blob
    pub data: String,
}

/// What an import produced
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub project: Project,
    pub assets_imported: usize,
    /// Image references that matched no asset in the document
    pub dangling: Vec<AssetId>,
}

// ==================== Export ====================

/// Build the export document for a project
///
/// Read-only with respect to the store.
pub fn export_project(db: &Database, id: ProjectId) -> StoreResult<ExportDocument> {
    let project = db.require_project(id)?;
    let assets = assets_for_project(db.connection(), id)?;

    let assets = assets
        .iter()
        .map(|asset| ExportedAsset {
            original_asset_id: asset.id,
            data: data_url::encode(&asset.blob),
        })
        .collect::<Vec<_>>();

    info!(
        "Exported project {} ({}) with {} asset(s)",
        id,
        project.name,
        assets.len()
    );

    Ok(ExportDocument {
        file_format_version: FILE_FORMAT_VERSION.to_string(),
        exported_at: Utc::now(),
        source_app: SOURCE_APP.to_string(),
        project: project.to_new_project(),
        assets,
    })
}

/// Filesystem-safe file name for an export of `project_name`
pub fn export_file_name(project_name: &str) -> String {
    let slug: String = project_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() {
        format!("project{}", EXPORT_EXTENSION)
    } else {
        format!("{}{}", slug, EXPORT_EXTENSION)
    }
}

/// Write an export document as pretty JSON into `dir`
///
/// Returns the path of the written file.
pub fn write_export(dir: &Path, document: &ExportDocument) -> StoreResult<PathBuf> {
    let path = dir.join(export_file_name(&document.project.name));
    let json = serde_json::to_vec_pretty(document)?;
    atomic_write(&path, &json)?;
    info!("Wrote export to {:?}", path);
    Ok(path)
}

// ==================== Import ====================

/// Parse and validate an export document
///
/// Nothing is written; a document that fails here never reaches the store.
pub fn parse_document(text: &str) -> StoreResult<ExportDocument> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::Validation(format!("file is not valid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::Validation("document must be a JSON object".to_string()))?;

    match obj.get("fileFormatVersion").and_then(Value::as_str) {
        Some(FILE_FORMAT_VERSION) => {}
        Some(other) => {
            return Err(StoreError::Validation(format!(
                "unsupported file format version '{}' (expected '{}')",
                other, FILE_FORMAT_VERSION
            )))
        }
        None => {
            return Err(StoreError::Validation(
                "missing fileFormatVersion".to_string(),
            ))
        }
    }

    for field in ["project", "assets"] {
        if obj.get(field).map_or(true, Value::is_null) {
            return Err(StoreError::Validation(format!("missing required field '{}'", field)));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| StoreError::Validation(format!("malformed export document: {}", e)))
}

/// Read and validate an export file
pub fn read_document(path: &Path) -> StoreResult<ExportDocument> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text)
}

/// Import a parsed document as a new project
pub fn import_document(db: &mut Database, document: ExportDocument) -> StoreResult<ImportOutcome> {
    let ExportDocument {
        project: incoming,
        assets,
        ..
    } = document;

    let outcome = db.transaction("import", |tx| {
        let draft = NewProject {
            uuid: Uuid::new_v4().to_string(),
            name: format!("{}{}", incoming.name, IMPORT_SUFFIX),
            last_modified: now_millis(),
            pages: incoming.pages,
        };
        let project_id = insert_project(tx, &draft)?;

        let mut mapping: HashMap<AssetId, AssetId> = HashMap::with_capacity(assets.len());
        for asset in &assets {
            let blob = data_url::decode(&asset.data)?;
            let new_id = insert_asset(tx, project_id, &blob)?;
            mapping.insert(asset.original_asset_id, new_id);
        }

        let mut project = draft.into_project(project_id);
        let dangling: Vec<AssetId> = project
            .image_references()
            .into_iter()
            .filter(|id| !mapping.contains_key(id))
            .collect();
        project.remap_assets(&mapping);
        put_project(tx, &project)?;

        Ok(ImportOutcome {
            project,
            assets_imported: assets.len(),
            dangling,
        })
    })?;

    if !outcome.dangling.is_empty() {
        warn!(
            "Imported project {} has {} image reference(s) with no matching asset",
            outcome.project.id,
            outcome.dangling.len()
        );
    }
    info!(
        "Imported project {} ({}) with {} asset(s)",
        outcome.project.id, outcome.project.name, outcome.assets_imported
    );
    Ok(outcome)
}
