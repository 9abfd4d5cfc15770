//! SQLite schema for the project and asset store
//!
//! Version history:
//! - 1: a single `projects` table holding one implicit project under a
//!   constant id, no `uuid`, no assets.
//! - 2: multi-project store keyed by `uuid`, out-of-line `assets`, and a
//!   `settings` key-value region.

use chrono::Utc;
use rusqlite::{Connection, Result, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

const SCHEMA_V2: &str = r#"
    -- Schema version tracking
    CREATE TABLE IF NOT EXISTS schema_info (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- Projects; pages are stored as a JSON document
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        last_modified INTEGER NOT NULL,
        pages TEXT NOT NULL
    );

    -- Binary assets. No foreign key: orphans must be representable so the
    -- sweeper can find them.
    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        blob BLOB NOT NULL
    );

    -- Process-wide flags
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(name);
    CREATE INDEX IF NOT EXISTS idx_projects_last_modified ON projects(last_modified);
    CREATE INDEX IF NOT EXISTS idx_assets_project_id ON assets(project_id);
"#;

/// Bring the database to [`SCHEMA_VERSION`]
///
/// Fresh databases get the current schema; version 1 databases are upgraded
/// in place inside one transaction.
pub fn init_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let legacy = get_schema_version(&tx)?.is_none() && table_exists(&tx, "projects")?;
    match get_schema_version(&tx)? {
        Some(1) => upgrade_v1_to_v2(&tx)?,
        None if legacy => upgrade_v1_to_v2(&tx)?,
        _ => tx.execute_batch(SCHEMA_V2)?,
    }

    tx.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

/// Rebuild the v1 projects table with a `uuid` column and back-fill it
fn upgrade_v1_to_v2(conn: &Connection) -> Result<()> {
    info!("Upgrading store schema from version 1 to {}", SCHEMA_VERSION);

    conn.execute_batch("ALTER TABLE projects RENAME TO projects_v1;")?;
    conn.execute_batch(SCHEMA_V2)?;

    let rows = {
        let mut stmt = conn.prepare("SELECT id, name, last_modified, pages FROM projects_v1")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;
        rows
    };

    for (id, name, last_modified, pages) in &rows {
        conn.execute(
            "INSERT INTO projects (id, uuid, name, last_modified, pages) VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![id, migrated_uuid(), name, last_modified, pages],
        )?;
    }

    conn.execute_batch("DROP TABLE projects_v1;")?;
    info!("Back-filled uuid for {} project(s)", rows.len());
    Ok(())
}

fn migrated_uuid() -> String {
    format!("migrated-{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    if !table_exists(conn, "schema_info")? {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?")?
        .exists([name])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_v1(conn: &Connection) {
        conn.execute_batch(
            r#"
            CREATE TABLE schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO schema_info (key, value) VALUES ('version', '1');
            CREATE TABLE projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                pages TEXT NOT NULL
            );
            INSERT INTO projects (id, name, last_modified, pages)
            VALUES (1, 'My invitation', 1700000000000, '[]');
            "#,
        )
        .unwrap();
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_init_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"projects".to_string()));
        assert!(tables.contains(&"assets".to_string()));
        assert!(tables.contains(&"settings".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Before init, needs init
        assert!(needs_init(&conn));

        init_schema(&mut conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_init_is_repeatable() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_indexes_exist() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_projects_name".to_string()));
        assert!(indexes.contains(&"idx_projects_last_modified".to_string()));
        assert!(indexes.contains(&"idx_assets_project_id".to_string()));
    }

    #[test]
    fn test_upgrade_from_v1_backfills_uuid() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_v1(&conn);
        assert!(needs_init(&conn));

        init_schema(&mut conn).unwrap();

        let (id, uuid, name): (i64, String, String) = conn
            .query_row("SELECT id, uuid, name FROM projects", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(name, "My invitation");
        assert!(uuid.starts_with("migrated-"));

        assert_eq!(get_schema_version(&conn).unwrap(), Some(2));
        assert!(!table_names(&conn).contains(&"projects_v1".to_string()));
        assert!(table_names(&conn).contains(&"assets".to_string()));
    }

    #[test]
    fn test_upgrade_from_unversioned_v1() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                pages TEXT NOT NULL
            );
            INSERT INTO projects VALUES (1, 'a', 0, '[]');
            "#,
        )
        .unwrap();

        init_schema(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM projects WHERE uuid LIKE 'migrated-%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_uuid_is_unique() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO projects (uuid, name, last_modified, pages) VALUES ('u1', 'a', 0, '[]')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO projects (uuid, name, last_modified, pages) VALUES ('u1', 'b', 0, '[]')",
            [],
        );
        assert!(dup.is_err());
    }
}
