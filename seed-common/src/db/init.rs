//! Database initialization
//!
//! Opens (creating on first run) the SQLite database and creates the schema
//! used by the matching engine. All `CREATE` statements are idempotent so
//! initialization is safe on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL allows concurrent readers with one writer; foreign keys are
    // applied per connection through the connect options.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool is limited to one connection so every query sees the same
/// in-memory database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_columns_table(pool).await?;
    create_column_mappings_tables(pool).await?;
    create_snapshots_tables(pool).await?;
    create_canonical_buildings_table(pool).await?;
    create_import_tables(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_columns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS columns (
            id TEXT PRIMARY KEY,
            organization_id TEXT,
            column_name TEXT NOT NULL,
            table_name TEXT,
            is_extra_data INTEGER NOT NULL DEFAULT 0,
            source_string_sha TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_columns_org_name ON columns(organization_id, column_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_column_mappings_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS column_mappings (
            id TEXT PRIMARY KEY,
            super_organization_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // side: 'raw' or 'mapped'; position keeps concatenation order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS column_mapping_columns (
            mapping_id TEXT NOT NULL REFERENCES column_mappings(id) ON DELETE CASCADE,
            column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
            side TEXT NOT NULL CHECK (side IN ('raw', 'mapped')),
            position INTEGER NOT NULL,
            PRIMARY KEY (mapping_id, column_id, side)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_snapshots_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            import_file_id TEXT,
            source_type TEXT NOT NULL,
            fields TEXT NOT NULL DEFAULT '{}',
            field_sources TEXT NOT NULL DEFAULT '{}',
            extra_data TEXT NOT NULL DEFAULT '{}',
            extra_data_sources TEXT NOT NULL DEFAULT '{}',
            canonical_building_id TEXT,
            confidence REAL,
            match_type TEXT,
            default_parent_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_organization ON snapshots(organization_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshot_parents (
            child_id TEXT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
            parent_id TEXT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            PRIMARY KEY (child_id, parent_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshot_parents_parent ON snapshot_parents(parent_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_canonical_buildings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS canonical_buildings (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            canonical_snapshot_id TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_canonical_buildings_organization ON canonical_buildings(organization_id, active)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_records (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            finished_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_files (
            id TEXT PRIMARY KEY,
            import_record_id TEXT NOT NULL REFERENCES import_records(id) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            num_rows INTEGER NOT NULL DEFAULT 0,
            num_columns INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS building_import_records (
            id TEXT PRIMARY KEY,
            import_record_id TEXT NOT NULL REFERENCES import_records(id) ON DELETE CASCADE,
            canonical_building_id TEXT NOT NULL,
            snapshot_id TEXT,
            was_in_database INTEGER NOT NULL DEFAULT 0,
            is_missing_from_import INTEGER NOT NULL DEFAULT 0,
            confidence REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        for table in [
            "columns",
            "column_mappings",
            "column_mapping_columns",
            "snapshots",
            "snapshot_parents",
            "canonical_buildings",
            "import_records",
            "import_files",
            "building_import_records",
        ] {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert!(exists, "table {} missing", table);
        }
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }
}
