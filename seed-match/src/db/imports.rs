//! Import record persistence

use super::{format_timestamp, parse_optional, parse_stored, parse_timestamp};
use crate::error::MatchResult;
use crate::models::{BuildingImportRecord, ImportFile, ImportRecord, ImportStatus};
use chrono::{DateTime, Utc};
use seed_common::ImportRecordId;
use sqlx::{Row, SqliteConnection};

pub async fn insert_import_record(conn: &mut SqliteConnection, record: &ImportRecord) -> MatchResult<()> {
    sqlx::query(
        r#"
        INSERT INTO import_records (id, organization_id, name, status, created_at, finished_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.organization_id.to_string())
    .bind(&record.name)
    .bind(record.status.to_string())
    .bind(format_timestamp(&record.created_at))
    .bind(record.finished_at.as_ref().map(format_timestamp))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_import_status(
    conn: &mut SqliteConnection,
    id: ImportRecordId,
    status: ImportStatus,
    finished_at: Option<DateTime<Utc>>,
) -> MatchResult<()> {
    sqlx::query("UPDATE import_records SET status = ?, finished_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(finished_at.as_ref().map(format_timestamp))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn load_import_record(
    conn: &mut SqliteConnection,
    id: ImportRecordId,
) -> MatchResult<Option<ImportRecord>> {
    let row = sqlx::query(
        "SELECT id, organization_id, name, status, created_at, finished_at FROM import_records WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let finished_at: Option<String> = row.get("finished_at");
    Ok(Some(ImportRecord {
        id: parse_stored("import_records.id", &row.get::<String, _>("id"))?,
        organization_id: parse_stored("import_records.organization_id", &row.get::<String, _>("organization_id"))?,
        name: row.get("name"),
        status: parse_stored("import_records.status", &row.get::<String, _>("status"))?,
        created_at: parse_timestamp("import_records.created_at", &row.get::<String, _>("created_at"))?,
        finished_at: finished_at
            .map(|ts| parse_timestamp("import_records.finished_at", &ts))
            .transpose()?,
    }))
}

pub async fn insert_import_file(conn: &mut SqliteConnection, file: &ImportFile) -> MatchResult<()> {
    sqlx::query(
        r#"
        INSERT INTO import_files (id, import_record_id, file_name, source_type, num_rows, num_columns, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            num_rows = excluded.num_rows,
            num_columns = excluded.num_columns
        "#,
    )
    .bind(file.id.to_string())
    .bind(file.import_record_id.to_string())
    .bind(&file.file_name)
    .bind(file.source_type.as_str())
    .bind(file.num_rows as i64)
    .bind(file.num_columns as i64)
    .bind(format_timestamp(&Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_building_import_records(
    conn: &mut SqliteConnection,
    records: &[BuildingImportRecord],
) -> MatchResult<()> {
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO building_import_records (
                id, import_record_id, canonical_building_id, snapshot_id,
                was_in_database, is_missing_from_import, confidence
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.import_record_id.to_string())
        .bind(record.canonical_building.to_string())
        .bind(record.snapshot.map(|id| id.to_string()))
        .bind(record.was_in_database as i64)
        .bind(record.is_missing_from_import as i64)
        .bind(record.confidence)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn load_building_import_records(
    conn: &mut SqliteConnection,
    import_record_id: ImportRecordId,
) -> MatchResult<Vec<BuildingImportRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, import_record_id, canonical_building_id, snapshot_id,
               was_in_database, is_missing_from_import, confidence
        FROM building_import_records
        WHERE import_record_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(import_record_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> MatchResult<BuildingImportRecord> {
            Ok(BuildingImportRecord {
                id: parse_stored("building_import_records.id", &row.get::<String, _>("id"))?,
                import_record_id,
                canonical_building: parse_stored(
                    "building_import_records.canonical_building_id",
                    &row.get::<String, _>("canonical_building_id"),
                )?,
                snapshot: parse_optional("building_import_records.snapshot_id", row.get("snapshot_id"))?,
                was_in_database: row.get::<i64, _>("was_in_database") != 0,
                is_missing_from_import: row.get::<i64, _>("is_missing_from_import") != 0,
                confidence: row.get("confidence"),
            })
        })
        .collect()
}
