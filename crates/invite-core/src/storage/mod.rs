//! Storage layer
//!
//! A single SQLite database holds three regions:
//!
//! - **projects**: document trees (pages → elements) keyed by a store id,
//!   unique on `uuid`
//! - **assets**: binary blobs owned by one project each
//! - **settings**: process-wide flags such as the migration marker
//!
//! Keeping all three in one database lets cross-region updates (project
//! deletion, import, migration) commit in a single transaction.

pub mod database;
pub mod error;
pub mod files;
pub mod schema;
pub mod settings;

pub use database::Database;
pub use error::{RecordKind, StoreError, StoreResult};
pub use files::atomic_write;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use settings::{SettingKey, Settings};
