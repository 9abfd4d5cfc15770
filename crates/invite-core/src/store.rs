//! Unified storage interface
//!
//! The `Store` is what the editor and the CLI talk to. Opening it runs the
//! startup sequence:
//!
//! 1. Open (or create) the SQLite database, upgrading old schemas
//! 2. Migrate a legacy single-project session, if one is waiting
//! 3. Sweep orphaned assets
//!
//! Steps 2 and 3 never fail the open; problems are logged and retried on the
//! next launch.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let project = store.create_project("Garden Party", 2)?;
//! let page_id = project.pages[0].id.clone();
//! store.add_text_element(project.id, &page_id, TextElement::new("You're invited"))?;
//!
//! let path = store.export_to_dir(project.id, Path::new("."))?;
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::autosave::Autosaver;
use crate::config::Config;
use crate::exchange::{self, ExportDocument, ImportOutcome};
use crate::imaging::{ImageNormalizer, ResizeNormalizer};
use crate::migration::{self, MigrationOutcome};
use crate::models::{
    Asset, AssetId, EditError, Element, ElementPatch, ImageElement, NewProject, Page, Project,
    ProjectId, TextElement,
};
use crate::storage::database::{insert_asset, put_project, require_project};
use crate::storage::{Database, StoreError};
use crate::sweeper::{self, SweepReport};

/// Unified storage interface for invitation projects
pub struct Store {
    db: Database,
    config: Config,
    normalizer: Box<dyn ImageNormalizer>,
}

impl Store {
    /// Open the store from the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let db = Database::open(&config).context("Failed to open SQLite database")?;
        let normalizer = Box::new(ResizeNormalizer::new(config.max_image_dimension));

        let mut store = Self {
            db,
            config,
            normalizer,
        };
        store.startup();
        Ok(store)
    }

    fn startup(&mut self) {
        match migration::migrate_legacy_session(&mut self.db) {
            Ok(MigrationOutcome::Migrated(id)) => info!("Migrated legacy session into project {}", id),
            Ok(outcome) => debug!("Legacy migration: {:?}", outcome),
            Err(e) => warn!("Legacy migration failed, will retry on next launch: {}", e),
        }

        sweeper::run_safeguard_sweep(&mut self.db);
    }

    /// Replace the image normalizer used for uploads
    pub fn with_normalizer(mut self, normalizer: impl ImageNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the database (for tests and maintenance)
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ==================== Project Operations ====================

    /// All projects, most recently modified first
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.db.list_projects().context("Failed to list projects")
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        self.db.get_project(id).context("Failed to get project")
    }

    /// Get a project, failing when it does not exist
    pub fn require_project(&self, id: ProjectId) -> Result<Project> {
        Ok(self.db.require_project(id)?)
    }

    /// Create a project with one blank page using `template_id`
    pub fn create_project(&self, name: &str, template_id: i64) -> Result<Project> {
        let draft = NewProject::new(name, template_id);
        let id = self
            .db
            .insert_project(&draft)
            .context("Failed to create project")?;
        info!("Created project {} ({})", id, name);
        Ok(draft.into_project(id))
    }

    pub fn rename_project(&self, id: ProjectId, name: &str) -> Result<Project> {
        Ok(self.db.rename_project(id, name)?)
    }

    /// Delete a project and all of its assets atomically
    ///
    /// Returns the number of assets removed.
    pub fn delete_project(&mut self, id: ProjectId) -> Result<usize> {
        Ok(self.db.delete_project(id)?)
    }

    /// Persist an edited project immediately, refreshing its timestamp
    pub fn save_project(&self, project: &Project) -> Result<Project> {
        let mut project = project.clone();
        project.touch();
        self.db.put_project(&project)?;
        Ok(project)
    }

    /// Load, edit and save a project in one step
    fn edit_project<T>(
        &self,
        id: ProjectId,
        edit: impl FnOnce(&mut Project) -> std::result::Result<T, EditError>,
    ) -> Result<T> {
        let mut project = self.db.require_project(id)?;
        let value = edit(&mut project).map_err(StoreError::from)?;
        project.touch();
        self.db.put_project(&project)?;
        Ok(value)
    }

    // ==================== Page Operations ====================

    /// Append a page; the template follows the project's first page
    pub fn add_page(&self, project_id: ProjectId, name: Option<String>) -> Result<Page> {
        self.edit_project(project_id, |project| Ok(project.add_page(name).clone()))
    }

    pub fn rename_page(&self, project_id: ProjectId, page_id: &str, name: &str) -> Result<()> {
        self.edit_project(project_id, |project| project.rename_page(page_id, name))
    }

    /// Remove a page; the last page of a project cannot be removed
    pub fn remove_page(&self, project_id: ProjectId, page_id: &str) -> Result<Page> {
        self.edit_project(project_id, |project| project.remove_page(page_id))
    }

    // ==================== Element Operations ====================

    /// Add a text element on top of a page, returning its id
    pub fn add_text_element(
        &self,
        project_id: ProjectId,
        page_id: &str,
        element: TextElement,
    ) -> Result<String> {
        element.validate().map_err(StoreError::from)?;
        self.edit_project(project_id, |project| {
            let page = page_mut(project, page_id)?;
            Ok(page.add_element(Element::Text(element)))
        })
    }

    /// Store an uploaded image and place it on a page
    ///
    /// The asset and the element referencing it are written in one
    /// transaction. Returns the new element id and asset id.
    pub fn add_image_element(
        &mut self,
        project_id: ProjectId,
        page_id: &str,
        bytes: &[u8],
    ) -> Result<(String, AssetId)> {
        let blob = self.normalizer.normalize(bytes)?;

        let added = self.db.transaction("add image", |tx| {
            let mut project = require_project(tx, project_id)?;
            if project.page(page_id).is_none() {
                return Err(EditError::PageNotFound(page_id.to_string()).into());
            }

            let asset_id = insert_asset(tx, project_id, &blob)?;
            let element_id = page_mut(&mut project, page_id)?
                .add_element(Element::Image(ImageElement::new(asset_id)));
            project.touch();
            put_project(tx, &project)?;
            Ok((element_id, asset_id))
        })?;

        debug!(
            "Added image element {} (asset {}) to project {}",
            added.0, added.1, project_id
        );
        Ok(added)
    }

    /// Move, resize, restyle or re-word an element
    ///
    /// The element keeps its kind and paint position. Returns the updated
    /// element; an invalid patch leaves the stored project untouched.
    pub fn update_element(
        &self,
        project_id: ProjectId,
        page_id: &str,
        element_id: &str,
        patch: &ElementPatch,
    ) -> Result<Element> {
        self.edit_project(project_id, |project| {
            page_mut(project, page_id)?
                .update_element(element_id, patch)
                .cloned()
        })
    }

    /// Remove an element from a page
    ///
    /// An image's asset stays with the project until the project is deleted.
    pub fn remove_element(
        &self,
        project_id: ProjectId,
        page_id: &str,
        element_id: &str,
    ) -> Result<Element> {
        self.edit_project(project_id, |project| {
            page_mut(project, page_id)?.remove_element(element_id)
        })
    }

    // ==================== Asset Operations ====================

    /// Normalize an uploaded image and store it as an asset of `project_id`
    ///
    /// The returned id is what an image element's `srcAssetId` carries.
    pub fn save_image_asset(&self, project_id: ProjectId, bytes: &[u8]) -> Result<AssetId> {
        self.db.require_project(project_id)?;
        let blob = self.normalizer.normalize(bytes)?;
        let id = self
            .db
            .insert_asset(project_id, &blob)
            .context("Failed to store image")?;
        Ok(id)
    }

    /// Resolve an asset reference to its stored bytes
    pub fn resolve_asset(&self, id: AssetId) -> Result<Asset> {
        let asset = self
            .db
            .get_asset(id)
            .context("Failed to read asset")?
            .ok_or_else(|| StoreError::not_found_asset(id))?;
        Ok(asset)
    }

    // ==================== Export / Import ====================

    pub fn export_project(&self, id: ProjectId) -> Result<ExportDocument> {
        Ok(exchange::export_project(&self.db, id)?)
    }

    /// Export a project into `dir`, returning the written file path
    pub fn export_to_dir(&self, id: ProjectId, dir: &Path) -> Result<PathBuf> {
        let document = self.export_project(id)?;
        Ok(exchange::write_export(dir, &document)?)
    }

    /// Import an export document given as text
    pub fn import_str(&mut self, text: &str) -> Result<ImportOutcome> {
        let document = exchange::parse_document(text)?;
        Ok(exchange::import_document(&mut self.db, document)?)
    }

    /// Import an export file
    pub fn import_file(&mut self, path: &Path) -> Result<ImportOutcome> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import file: {:?}", path))?;
        self.import_str(&text)
    }

    // ==================== Maintenance ====================

    /// Run the legacy migration now, propagating failures
    pub fn run_migration(&mut self) -> Result<MigrationOutcome> {
        Ok(migration::migrate_legacy_session(&mut self.db)?)
    }

    /// Place a legacy session document where the next migration will find it
    pub fn stash_legacy_session(&self, raw: &str) -> Result<()> {
        Ok(migration::stash_legacy_session(&self.db, raw)?)
    }

    /// Sweep orphaned assets now, propagating failures
    pub fn sweep(&mut self) -> Result<SweepReport> {
        Ok(sweeper::sweep_orphaned_assets(&mut self.db)?)
    }

    /// Clear all process-wide settings (the migration flag included)
    pub fn reset_settings(&self) -> Result<usize> {
        Ok(self.db.settings().reset()?)
    }

    // ==================== Autosave ====================

    /// Start an autosaver writing through its own database connection
    ///
    /// Must be called from within a tokio runtime.
    pub fn autosaver(&self) -> Result<Autosaver> {
        let db = Database::open(&self.config).context("Failed to open autosave connection")?;
        Ok(Autosaver::spawn(db, self.config.autosave_delay()))
    }
}

fn page_mut<'a>(project: &'a mut Project, page_id: &str) -> std::result::Result<&'a mut Page, EditError> {
    project
        .page_mut(page_id)
        .ok_or_else(|| EditError::PageNotFound(page_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Passthrough;
    use crate::storage::SettingKey;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            autosave_delay_ms: 50,
            ..Config::default()
        }
    }

    fn open_store(temp_dir: &TempDir) -> Store {
        Store::open_with_config(test_config(temp_dir))
            .unwrap()
            .with_normalizer(Passthrough)
    }

    fn store_error(err: &anyhow::Error) -> &StoreError {
        err.downcast_ref::<StoreError>()
            .expect("error should carry a StoreError")
    }

    #[test]
    fn test_open_creates_new_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::open_with_config(config.clone()).unwrap();

        assert!(config.database_path().exists());
        assert!(store.list_projects().unwrap().is_empty());
        assert!(store
            .database()
            .settings()
            .flag(SettingKey::MigrationComplete)
            .unwrap());
    }

    #[test]
    fn test_open_migrates_legacy_session() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        {
            let db = Database::open(&config).unwrap();
            migration::stash_legacy_session(
                &db,
                r#"{"selectedTemplateId": 3, "elements": [
                    {"id": "a", "type": "image", "x": 0, "y": 0, "width": 10,
                     "height": 10, "rotation": 0, "src": "data:image/png;base64,AAAA"}
                ]}"#,
            )
            .unwrap();
        }

        let store = Store::open_with_config(config).unwrap();
        let projects = store.list_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, migration::LEGACY_PROJECT_NAME);
        assert_eq!(projects[0].pages[0].template_id, 3);

        let asset = store
            .resolve_asset(projects[0].image_references()[0])
            .unwrap();
        assert_eq!(asset.blob, vec![0, 0, 0]);
    }

    #[test]
    fn test_open_survives_failed_migration() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        {
            let db = Database::open(&config).unwrap();
            migration::stash_legacy_session(
                &db,
                r#"{"selectedTemplateId": 1, "elements": [
                    {"id": "a", "type": "image", "x": 0, "y": 0, "width": 10,
                     "height": 10, "rotation": 0, "src": "not-a-data-url"}
                ]}"#,
            )
            .unwrap();
        }

        let mut store = Store::open_with_config(config).unwrap();
        assert!(store.list_projects().unwrap().is_empty());

        // Still pending, so an explicit run reports the failure
        let err = store.run_migration().unwrap_err();
        assert!(store_error(&err).is_validation());
    }

    #[test]
    fn test_open_sweeps_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        {
            let db = Database::open(&config).unwrap();
            db.insert_asset(404, b"orphan").unwrap();
        }

        let store = Store::open_with_config(config).unwrap();
        assert_eq!(store.database().asset_count().unwrap(), 0);
    }

    #[test]
    fn test_create_rename_delete_project() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);

        let project = store.create_project("Birthday", 4).unwrap();
        assert_eq!(project.pages.len(), 1);
        assert_eq!(project.pages[0].template_id, 4);
        assert_eq!(store.require_project(project.id).unwrap(), project);

        let renamed = store.rename_project(project.id, "Sweet 16").unwrap();
        assert_eq!(renamed.name, "Sweet 16");

        store.save_image_asset(project.id, b"img").unwrap();
        assert_eq!(store.delete_project(project.id).unwrap(), 1);
        assert!(store.get_project(project.id).unwrap().is_none());
        assert_eq!(store.database().asset_count().unwrap(), 0);

        let err = store.delete_project(project.id).unwrap_err();
        assert!(store_error(&err).is_not_found());
    }

    #[test]
    fn test_page_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let project = store.create_project("Pages", 2).unwrap();
        let first = project.pages[0].id.clone();

        let added = store.add_page(project.id, None).unwrap();
        assert_eq!(added.name, "Page 2");
        assert_eq!(added.template_id, 2);

        store.rename_page(project.id, &added.id, "RSVP").unwrap();
        let stored = store.require_project(project.id).unwrap();
        assert_eq!(stored.pages[1].name, "RSVP");
        assert!(stored.last_modified >= project.last_modified);

        store.remove_page(project.id, &first).unwrap();
        let err = store.remove_page(project.id, &added.id).unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::LastPage)
        ));

        let err = store.rename_page(project.id, "page-missing", "x").unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_element_operations() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let project = store.create_project("Elements", 1).unwrap();
        let page = project.pages[0].id.clone();

        let text_id = store
            .add_text_element(project.id, &page, TextElement::new("Hello"))
            .unwrap();
        let (image_id, asset_id) = store
            .add_image_element(project.id, &page, b"picture")
            .unwrap();

        let stored = store.require_project(project.id).unwrap();
        let ids: Vec<_> = stored.pages[0].elements.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![text_id.as_str(), image_id.as_str()]);
        assert_eq!(stored.image_references(), vec![asset_id]);

        let asset = store.resolve_asset(asset_id).unwrap();
        assert_eq!(asset.project_id, project.id);
        assert_eq!(asset.blob, b"picture".to_vec());

        let removed = store.remove_element(project.id, &page, &image_id).unwrap();
        assert_eq!(removed.kind(), "image");
        assert_eq!(store.require_project(project.id).unwrap().pages[0].elements.len(), 1);
        // The asset stays owned by the project
        assert!(store.resolve_asset(asset_id).is_ok());
    }

    #[test]
    fn test_update_element() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let project = store.create_project("Updates", 1).unwrap();
        let page = project.pages[0].id.clone();

        let text_id = store
            .add_text_element(project.id, &page, TextElement::new("Hello"))
            .unwrap();
        let (image_id, _) = store
            .add_image_element(project.id, &page, b"picture")
            .unwrap();

        let patch = ElementPatch {
            text: Some("Hello again".to_string()),
            font_size: Some(28.0),
            x: Some(10.0),
            ..ElementPatch::default()
        };
        let updated = store
            .update_element(project.id, &page, &text_id, &patch)
            .unwrap();
        assert_eq!(updated.frame().x, 10.0);

        let stored = store.require_project(project.id).unwrap();
        assert!(stored.last_modified >= project.last_modified);
        match stored.pages[0].element(&text_id).unwrap() {
            Element::Text(t) => {
                assert_eq!(t.text, "Hello again");
                assert_eq!(t.font_size, 28.0);
            }
            Element::Image(_) => panic!("expected text element"),
        }

        let moved = ElementPatch {
            rotation: Some(45.0),
            ..ElementPatch::default()
        };
        store
            .update_element(project.id, &page, &image_id, &moved)
            .unwrap();
        let stored = store.require_project(project.id).unwrap();
        assert_eq!(stored.pages[0].element(&image_id).unwrap().frame().rotation, 45.0);
    }

    #[test]
    fn test_update_element_rejects_invalid_patch() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let project = store.create_project("Strict updates", 1).unwrap();
        let page = project.pages[0].id.clone();
        let text_id = store
            .add_text_element(project.id, &page, TextElement::new("Hello"))
            .unwrap();
        let (image_id, _) = store
            .add_image_element(project.id, &page, b"picture")
            .unwrap();
        let before = store.require_project(project.id).unwrap();

        let text_on_image = ElementPatch {
            text: Some("caption".to_string()),
            ..ElementPatch::default()
        };
        let err = store
            .update_element(project.id, &page, &image_id, &text_on_image)
            .unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::TextFieldOnImage(_))
        ));

        let zero_size = ElementPatch {
            font_size: Some(0.0),
            ..ElementPatch::default()
        };
        let err = store
            .update_element(project.id, &page, &text_id, &zero_size)
            .unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::InvalidFontSize(_))
        ));

        let err = store
            .update_element(project.id, &page, "el-missing", &zero_size)
            .unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::ElementNotFound(_))
        ));

        assert_eq!(store.require_project(project.id).unwrap(), before);
    }

    #[test]
    fn test_invalid_text_element_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let project = store.create_project("Text", 1).unwrap();

        let mut text = TextElement::new("tiny");
        text.font_size = 0.0;
        let err = store
            .add_text_element(project.id, &project.pages[0].id, text)
            .unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::Edit(EditError::InvalidFontSize(_))
        ));
    }

    #[test]
    fn test_add_image_to_missing_page_stores_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let project = store.create_project("Images", 1).unwrap();

        assert!(store
            .add_image_element(project.id, "page-nope", b"picture")
            .is_err());
        assert_eq!(store.database().asset_count().unwrap(), 0);
    }

    #[test]
    fn test_resize_normalizer_rejects_non_images() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open_with_config(test_config(&temp_dir)).unwrap();
        let project = store.create_project("Strict", 1).unwrap();

        let err = store.save_image_asset(project.id, b"not an image").unwrap_err();
        assert!(store_error(&err).is_validation());
    }

    #[test]
    fn test_resolve_missing_asset() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let err = store.resolve_asset(12).unwrap_err();
        assert!(store_error(&err).is_not_found());
    }

    #[test]
    fn test_export_file_then_import() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let project = store.create_project("Baby Shower", 1).unwrap();
        let page = project.pages[0].id.clone();
        store.add_image_element(project.id, &page, b"stork").unwrap();

        let out_dir = temp_dir.path().join("exports");
        let path = store.export_to_dir(project.id, &out_dir).unwrap();
        assert!(path.ends_with("baby_shower.invite.json"));

        let outcome = store.import_file(&path).unwrap();
        assert_eq!(outcome.project.name, "Baby Shower (Impor)");
        let asset = store
            .resolve_asset(outcome.project.image_references()[0])
            .unwrap();
        assert_eq!(asset.blob, b"stork".to_vec());
        assert_eq!(store.list_projects().unwrap().len(), 2);
    }

    #[test]
    fn test_import_error_keeps_message() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);

        let err = store
            .import_str(r#"{"fileFormatVersion": "9", "project": {}, "assets": []}"#)
            .unwrap_err();
        let store_err = store_error(&err);
        assert!(store_err.is_user_facing());
        assert!(store_err.user_message("Import failed").contains("unsupported"));
    }

    #[test]
    fn test_stash_and_rerun_migration() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);

        store
            .stash_legacy_session(r#"{"selectedTemplateId": 1, "elements": []}"#)
            .unwrap();
        assert_eq!(
            store.run_migration().unwrap(),
            MigrationOutcome::AlreadyComplete
        );

        store.reset_settings().unwrap();
        store
            .stash_legacy_session(r#"{"selectedTemplateId": 1, "elements": []}"#)
            .unwrap();
        assert!(matches!(
            store.run_migration().unwrap(),
            MigrationOutcome::Migrated(_)
        ));
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let store = open_store(&temp_dir);
            store.create_project("Persistent", 1).unwrap().id
        };

        let store = open_store(&temp_dir);
        assert_eq!(store.require_project(id).unwrap().name, "Persistent");
    }

    #[tokio::test]
    async fn test_autosaver_writes_through_own_connection() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let mut project = store.create_project("Draft", 1).unwrap();

        let saver = store.autosaver().unwrap();
        project.name = "Autosaved".to_string();
        saver.schedule(project.clone());
        assert!(saver.flush().await);
        saver.shutdown().await;

        assert_eq!(store.require_project(project.id).unwrap().name, "Autosaved");
    }
}
