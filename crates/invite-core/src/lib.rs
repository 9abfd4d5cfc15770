//! Invite Core Library
//!
//! Persistence core of the invitation editor: multi-page invitation
//! projects, the image assets they own, and the machinery that keeps the two
//! consistent.
//!
//! # Architecture
//!
//! - **SQLite**: one database holds projects, assets and a small settings
//!   region; cross-collection changes run in a single transaction
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! let project = store.create_project("Garden Party", 1)?;
//! let page = &project.pages[0].id;
//! store.add_text_element(project.id, page, TextElement::new("You're invited"))?;
//!
//! let path = store.export_to_dir(project.id, Path::new("."))?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Projects, pages, elements and assets
//! - `storage`: SQLite database, schema and settings region
//! - `migration`: One-shot upgrade of the legacy single-project session
//! - `sweeper`: Removal of orphaned assets
//! - `exchange`: Export/import of single projects
//! - `autosave`: Debounced background writes
//! - `imaging`: Image normalization before storage
//! - `config`: Application configuration

pub mod autosave;
pub mod config;
pub mod data_url;
pub mod exchange;
pub mod imaging;
pub mod migration;
pub mod models;
pub mod storage;
pub mod store;
pub mod sweeper;

pub use autosave::{Autosaver, ProjectSink};
pub use config::Config;
pub use exchange::{ExportDocument, ExportedAsset, ImportOutcome};
pub use imaging::{ImageNormalizer, Passthrough, ResizeNormalizer};
pub use migration::MigrationOutcome;
pub use models::{
    Asset, AssetId, EditError, Element, ElementPatch, FontFamily, Frame, ImageElement,
    NewProject, Page, Project, ProjectId, TextAlign, TextElement, DEFAULT_TEMPLATE_ID,
};
pub use storage::{Database, RecordKind, SettingKey, StoreError, StoreResult};
pub use store::Store;
pub use sweeper::SweepReport;
