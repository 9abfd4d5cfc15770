//! SQLite project and asset store
//!
//! ## Tables
//!
//! - `projects` - project rows; `pages` holds the page/element tree as JSON
//! - `assets` - binary payloads, each owned by one project via `project_id`
//! - `settings` - key-value flags (see [`Settings`])
//!
//! Single-collection operations run directly on the connection. Anything
//! that must keep projects and assets consistent with each other goes
//! through [`Database::transaction`], which rolls back on the first error.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Asset, AssetId, NewProject, Page, Project, ProjectId};
use crate::storage::error::{map_project_insert, StoreError, StoreResult};
use crate::storage::schema::{init_schema, needs_init};
use crate::storage::settings::Settings;

/// Handle to the store database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database in the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.database_path())
    }

    /// Open or create the database at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // Another connection (e.g. the autosaver) may hold the write lock briefly
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        if needs_init(&conn) {
            init_schema(&mut conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Settings region on this connection
    pub fn settings(&self) -> Settings<'_> {
        Settings::new(&self.conn)
    }

    /// Run `f` inside one IMMEDIATE transaction
    ///
    /// Commits when `f` succeeds. On any error the transaction is rolled
    /// back and the error is reported as a transaction failure for
    /// `operation`.
    pub fn transaction<T, F>(&mut self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::in_transaction(operation, e.into()))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| StoreError::in_transaction(operation, e.into()))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback of {} failed: {}", operation, rollback_err);
                }
                Err(StoreError::in_transaction(operation, e))
            }
        }
    }

    // ==================== Projects ====================

    /// Insert a project, returning its store-assigned id
    pub fn insert_project(&self, project: &NewProject) -> StoreResult<ProjectId> {
        insert_project(&self.conn, project)
    }

    /// Get a project by id
    pub fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        get_project(&self.conn, id)
    }

    /// Get a project by id, failing with NotFound when absent
    pub fn require_project(&self, id: ProjectId) -> StoreResult<Project> {
        require_project(&self.conn, id)
    }

    /// Get a project by its external identifier
    pub fn find_project_by_uuid(&self, uuid: &str) -> StoreResult<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, uuid, name, last_modified, pages FROM projects WHERE uuid = ?",
                params![uuid],
                ProjectRow::from_row,
            )
            .optional()?;
        row.map(ProjectRow::into_project).transpose()
    }

    /// All projects, most recently modified first
    pub fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, last_modified, pages FROM projects
             ORDER BY last_modified DESC, id DESC",
        )?;

        let rows = stmt
            .query_map([], ProjectRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    /// Replace a stored project with `project`
    pub fn put_project(&self, project: &Project) -> StoreResult<()> {
        put_project(&self.conn, project)
    }

    /// Rename a project and bump its modification time
    pub fn rename_project(&self, id: ProjectId, name: &str) -> StoreResult<Project> {
        let mut project = self.require_project(id)?;
        project.name = name.to_string();
        project.touch();
        self.put_project(&project)?;
        Ok(project)
    }

    /// Delete a project together with every asset it owns
    ///
    /// Returns the number of assets removed. Either both collections change
    /// or neither does.
    pub fn delete_project(&mut self, id: ProjectId) -> StoreResult<usize> {
        let removed = self.transaction("delete project", |tx| {
            if !project_exists(tx, id)? {
                return Err(StoreError::not_found_project(id));
            }
            let assets = tx.execute("DELETE FROM assets WHERE project_id = ?", params![id])?;
            tx.execute("DELETE FROM projects WHERE id = ?", params![id])?;
            Ok(assets)
        })?;

        info!("Deleted project {} and {} asset(s)", id, removed);
        Ok(removed)
    }

    pub fn project_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?)
    }

    pub fn project_ids(&self) -> StoreResult<Vec<ProjectId>> {
        project_ids(&self.conn)
    }

    // ==================== Assets ====================

    /// Store a blob owned by `project_id`
    pub fn insert_asset(&self, project_id: ProjectId, blob: &[u8]) -> StoreResult<AssetId> {
        insert_asset(&self.conn, project_id, blob)
    }

    /// Get an asset by id
    pub fn get_asset(&self, id: AssetId) -> StoreResult<Option<Asset>> {
        let asset = self
            .conn
            .query_row(
                "SELECT id, project_id, blob FROM assets WHERE id = ?",
                params![id],
                |row| {
                    Ok(Asset {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        blob: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(asset)
    }

    /// Assets owned by a project, in insertion order
    pub fn assets_for_project(&self, project_id: ProjectId) -> StoreResult<Vec<Asset>> {
        assets_for_project(&self.conn, project_id)
    }

    /// `(asset id, owner id)` for every asset, without loading blobs
    pub fn asset_owners(&self) -> StoreResult<Vec<(AssetId, ProjectId)>> {
        asset_owners(&self.conn)
    }

    /// Delete assets by id, returning how many rows went away
    pub fn delete_assets(&self, ids: &[AssetId]) -> StoreResult<usize> {
        delete_assets(&self.conn, ids)
    }

    pub fn asset_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?)
    }
}

// ==================== Internal structs ====================

struct ProjectRow {
    id: ProjectId,
    uuid: String,
    name: String,
    last_modified: i64,
    pages: String,
}

impl ProjectRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(ProjectRow {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            last_modified: row.get(3)?,
            pages: row.get(4)?,
        })
    }

    fn into_project(self) -> StoreResult<Project> {
        let pages: Vec<Page> = serde_json::from_str(&self.pages)?;
        let last_modified =
            DateTime::from_timestamp_millis(self.last_modified).unwrap_or_else(Utc::now);

        Ok(Project {
            id: self.id,
            uuid: self.uuid,
            name: self.name,
            last_modified,
            pages,
        })
    }
}

// ==================== Connection helpers ====================
//
// Free functions take `&Connection` so they run unchanged inside a
// `Transaction`, which derefs to `Connection`.

pub(crate) fn insert_project(conn: &Connection, project: &NewProject) -> StoreResult<ProjectId> {
    let pages = serde_json::to_string(&project.pages)?;
    conn.execute(
        "INSERT INTO projects (uuid, name, last_modified, pages) VALUES (?, ?, ?, ?)",
        params![
            project.uuid,
            project.name,
            project.last_modified.timestamp_millis(),
            pages,
        ],
    )
    .map_err(|e| map_project_insert(e, &project.uuid))?;

    let id = conn.last_insert_rowid();
    debug!("Inserted project {} ({})", id, project.uuid);
    Ok(id)
}

pub(crate) fn get_project(conn: &Connection, id: ProjectId) -> StoreResult<Option<Project>> {
    let row = conn
        .query_row(
            "SELECT id, uuid, name, last_modified, pages FROM projects WHERE id = ?",
            params![id],
            ProjectRow::from_row,
        )
        .optional()?;
    row.map(ProjectRow::into_project).transpose()
}

pub(crate) fn require_project(conn: &Connection, id: ProjectId) -> StoreResult<Project> {
    get_project(conn, id)?.ok_or_else(|| StoreError::not_found_project(id))
}

pub(crate) fn put_project(conn: &Connection, project: &Project) -> StoreResult<()> {
    let pages = serde_json::to_string(&project.pages)?;
    let updated = conn
        .execute(
            "UPDATE projects SET uuid = ?, name = ?, last_modified = ?, pages = ? WHERE id = ?",
            params![
                project.uuid,
                project.name,
                project.last_modified.timestamp_millis(),
                pages,
                project.id,
            ],
        )
        .map_err(|e| map_project_insert(e, &project.uuid))?;

    if updated == 0 {
        return Err(StoreError::not_found_project(project.id));
    }
    debug!("Saved project {}", project.id);
    Ok(())
}

pub(crate) fn project_exists(conn: &Connection, id: ProjectId) -> StoreResult<bool> {
    Ok(conn
        .prepare("SELECT 1 FROM projects WHERE id = ?")?
        .exists(params![id])?)
}

pub(crate) fn project_ids(conn: &Connection) -> StoreResult<Vec<ProjectId>> {
    let mut stmt = conn.prepare("SELECT id FROM projects")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<ProjectId>, _>>()?;
    Ok(ids)
}

pub(crate) fn insert_asset(
    conn: &Connection,
    project_id: ProjectId,
    blob: &[u8],
) -> StoreResult<AssetId> {
    conn.execute(
        "INSERT INTO assets (project_id, blob) VALUES (?, ?)",
        params![project_id, blob],
    )?;
    let id = conn.last_insert_rowid();
    debug!("Inserted asset {} for project {} ({} bytes)", id, project_id, blob.len());
    Ok(id)
}

pub(crate) fn assets_for_project(
    conn: &Connection,
    project_id: ProjectId,
) -> StoreResult<Vec<Asset>> {
    let mut stmt =
        conn.prepare("SELECT id, project_id, blob FROM assets WHERE project_id = ? ORDER BY id")?;
    let assets = stmt
        .query_map(params![project_id], |row| {
            Ok(Asset {
                id: row.get(0)?,
                project_id: row.get(1)?,
                blob: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assets)
}

pub(crate) fn asset_owners(conn: &Connection) -> StoreResult<Vec<(AssetId, ProjectId)>> {
    let mut stmt = conn.prepare("SELECT id, project_id FROM assets ORDER BY id")?;
    let owners = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(owners)
}

pub(crate) fn delete_assets(conn: &Connection, ids: &[AssetId]) -> StoreResult<usize> {
    let mut stmt = conn.prepare("DELETE FROM assets WHERE id = ?")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id])?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Element, ImageElement, TextElement};

    fn create_test_db() -> (Database, ProjectId) {
        let db = Database::open_in_memory().unwrap();
        let mut draft = NewProject::new("Wedding", 1);
        draft.pages[0].add_element(Element::Text(TextElement::new("The Wedding Of")));
        let id = db.insert_project(&draft).unwrap();
        (db, id)
    }

    #[test]
    fn test_insert_and_get_project() {
        let (db, id) = create_test_db();

        let project = db.get_project(id).unwrap().unwrap();
        assert_eq!(project.id, id);
        assert_eq!(project.name, "Wedding");
        assert_eq!(project.pages.len(), 1);
        assert_eq!(project.pages[0].elements.len(), 1);

        assert!(db.get_project(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_round_trip_preserves_document() {
        let db = Database::open_in_memory().unwrap();
        let draft = NewProject::new("Exact", 3);
        let id = db.insert_project(&draft).unwrap();

        let stored = db.require_project(id).unwrap();
        assert_eq!(stored.to_new_project(), draft);
    }

    #[test]
    fn test_require_project_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.require_project(9).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 9, .. }));
    }

    #[test]
    fn test_duplicate_uuid_is_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = NewProject::new("a", 1);
        draft.uuid = "u1".to_string();
        db.insert_project(&draft).unwrap();

        let err = db.insert_project(&draft).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { ref uuid } if uuid == "u1"));
    }

    #[test]
    fn test_find_by_uuid() {
        let db = Database::open_in_memory().unwrap();
        let draft = NewProject::new("a", 1);
        let id = db.insert_project(&draft).unwrap();

        let found = db.find_project_by_uuid(&draft.uuid).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(db.find_project_by_uuid("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_projects_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        let mut old = NewProject::new("old", 1);
        old.last_modified = DateTime::from_timestamp_millis(1_000).unwrap();
        let mut new = NewProject::new("new", 1);
        new.last_modified = DateTime::from_timestamp_millis(2_000).unwrap();
        db.insert_project(&old).unwrap();
        db.insert_project(&new).unwrap();

        let names: Vec<_> = db
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[test]
    fn test_put_project_replaces_pages() {
        let (db, id) = create_test_db();
        let mut project = db.require_project(id).unwrap();
        project.add_page(Some("Second".to_string()));
        db.put_project(&project).unwrap();

        let stored = db.require_project(id).unwrap();
        assert_eq!(stored.pages.len(), 2);
        assert_eq!(stored.pages[1].name, "Second");
    }

    #[test]
    fn test_put_missing_project_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let project = NewProject::new("ghost", 1).into_project(77);
        let err = db.put_project(&project).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_project_bumps_last_modified() {
        let (db, id) = create_test_db();
        let before = db.require_project(id).unwrap().last_modified;
        std::thread::sleep(std::time::Duration::from_millis(5));

        let renamed = db.rename_project(id, "Renamed").unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert!(renamed.last_modified > before);
        assert_eq!(db.require_project(id).unwrap().name, "Renamed");
    }

    #[test]
    fn test_assets_by_owner() {
        let (db, id) = create_test_db();
        let other = db.insert_project(&NewProject::new("other", 1)).unwrap();

        let a1 = db.insert_asset(id, b"one").unwrap();
        let a2 = db.insert_asset(id, b"two").unwrap();
        db.insert_asset(other, b"three").unwrap();

        let owned = db.assets_for_project(id).unwrap();
        assert_eq!(owned.iter().map(|a| a.id).collect::<Vec<_>>(), vec![a1, a2]);
        assert_eq!(owned[1].blob, b"two".to_vec());

        let asset = db.get_asset(a1).unwrap().unwrap();
        assert_eq!(asset.project_id, id);
        assert!(db.get_asset(a2 + 100).unwrap().is_none());
    }

    #[test]
    fn test_delete_assets_bulk() {
        let (db, id) = create_test_db();
        let a1 = db.insert_asset(id, b"one").unwrap();
        let a2 = db.insert_asset(id, b"two").unwrap();
        let a3 = db.insert_asset(id, b"three").unwrap();

        assert_eq!(db.delete_assets(&[a1, a3, 999]).unwrap(), 2);
        assert_eq!(db.asset_owners().unwrap(), vec![(a2, id)]);
    }

    #[test]
    fn test_delete_project_removes_assets() {
        let (mut db, id) = create_test_db();
        let other = db.insert_project(&NewProject::new("other", 1)).unwrap();
        db.insert_asset(id, b"one").unwrap();
        db.insert_asset(id, b"two").unwrap();
        let kept = db.insert_asset(other, b"keep").unwrap();

        assert_eq!(db.delete_project(id).unwrap(), 2);
        assert!(db.get_project(id).unwrap().is_none());
        assert_eq!(db.asset_owners().unwrap(), vec![(kept, other)]);
    }

    #[test]
    fn test_delete_missing_project() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db.delete_project(5).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_project_rolls_back_on_failure() {
        let (mut db, id) = create_test_db();
        db.insert_asset(id, b"one").unwrap();
        db.insert_asset(id, b"two").unwrap();

        // Assets go first, then the project delete aborts
        db.connection()
            .execute_batch(
                "CREATE TRIGGER fail_project_delete BEFORE DELETE ON projects
                 BEGIN SELECT RAISE(ABORT, 'induced failure'); END;",
            )
            .unwrap();

        let err = db.delete_project(id).unwrap_err();
        assert!(matches!(err, StoreError::Transaction { .. }));

        assert!(db.get_project(id).unwrap().is_some());
        assert_eq!(db.assets_for_project(id).unwrap().len(), 2);
    }

    #[test]
    fn test_transaction_commits_and_rolls_back() {
        let (mut db, id) = create_test_db();

        let asset = db
            .transaction("add asset", |tx| insert_asset(tx, id, b"ok"))
            .unwrap();
        assert!(db.get_asset(asset).unwrap().is_some());

        let result: StoreResult<()> = db.transaction("add then fail", |tx| {
            insert_asset(tx, id, b"lost")?;
            Err(StoreError::Validation("boom".to_string()))
        });
        assert!(result.unwrap_err().is_validation());
        assert_eq!(db.asset_count().unwrap(), 1);
    }

    #[test]
    fn test_image_element_survives_storage() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = NewProject::new("img", 1);
        draft.pages[0].add_element(Element::Image(ImageElement::new(12)));
        let id = db.insert_project(&draft).unwrap();

        assert_eq!(db.require_project(id).unwrap().image_references(), vec![12]);
    }

    #[test]
    fn test_open_path_creates_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("invite.db");

        {
            let db = Database::open_path(&path).unwrap();
            db.insert_project(&NewProject::new("persisted", 1)).unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.project_count().unwrap(), 1);
    }
}
