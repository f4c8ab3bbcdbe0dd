//! Column registry and column mapping persistence

use super::{parse_optional, parse_stored};
use crate::error::{MatchError, MatchResult};
use crate::mapping::ColumnMappingResolver;
use crate::models::{BuildingField, Column, ColumnMapping, MappingRequest, MappingSide};
use seed_common::values::is_blank_str;
use seed_common::OrganizationId;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Look up a column by name, creating it when absent
pub async fn get_or_create_column(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
    column_name: &str,
    table_name: Option<&str>,
    is_extra_data: bool,
) -> MatchResult<Column> {
    let existing = sqlx::query(
        r#"
        SELECT id, table_name, is_extra_data
        FROM columns
        WHERE organization_id = ? AND column_name = ?
        ORDER BY rowid
        LIMIT 1
        "#,
    )
    .bind(organization_id.to_string())
    .bind(column_name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = existing {
        let id: String = row.get("id");
        return Ok(Column {
            id: parse_stored("columns.id", &id)?,
            organization_id: Some(organization_id),
            column_name: column_name.to_string(),
            table_name: row.get("table_name"),
            is_extra_data: row.get::<i64, _>("is_extra_data") != 0,
        });
    }

    let mut column = Column::new(Some(organization_id), column_name);
    column.table_name = table_name.map(str::to_string);
    column.is_extra_data = is_extra_data;

    sqlx::query(
        r#"
        INSERT INTO columns (id, organization_id, column_name, table_name, is_extra_data, source_string_sha)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(column.id.to_string())
    .bind(organization_id.to_string())
    .bind(&column.column_name)
    .bind(&column.table_name)
    .bind(column.is_extra_data as i64)
    .bind(column.source_string_sha())
    .execute(&mut *conn)
    .await?;

    debug!(column = %column_name, extra_data = is_extra_data, "Registered column");
    Ok(column)
}

/// All column mappings of an organization, in creation order
pub async fn load_mappings(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
) -> MatchResult<Vec<ColumnMapping>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id AS mapping_id, m.super_organization_id, mc.side,
               c.id AS column_id, c.organization_id, c.column_name, c.table_name, c.is_extra_data
        FROM column_mappings m
        LEFT JOIN column_mapping_columns mc ON mc.mapping_id = m.id
        LEFT JOIN columns c ON c.id = mc.column_id
        WHERE m.super_organization_id = ?
        ORDER BY m.rowid, mc.side, mc.position
        "#,
    )
    .bind(organization_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut mappings: Vec<ColumnMapping> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for row in &rows {
        let mapping_id: Uuid = parse_stored("column_mappings.id", &row.get::<String, _>("mapping_id"))?;
        let slot = *index.entry(mapping_id).or_insert_with(|| {
            mappings.push(ColumnMapping {
                id: mapping_id,
                super_organization: Some(organization_id),
                column_raw: Vec::new(),
                column_mapped: Vec::new(),
            });
            mappings.len() - 1
        });

        let Some(column_id) = row.get::<Option<String>, _>("column_id") else {
            continue;
        };
        let column = Column {
            id: parse_stored("columns.id", &column_id)?,
            organization_id: parse_optional("columns.organization_id", row.get("organization_id"))?,
            column_name: row.get("column_name"),
            table_name: row.get("table_name"),
            is_extra_data: row.get::<i64, _>("is_extra_data") != 0,
        };
        match row.get::<Option<String>, _>("side").as_deref() {
            Some("raw") => mappings[slot].column_raw.push(column),
            Some("mapped") => mappings[slot].column_mapped.push(column),
            other => {
                return Err(MatchError::Corrupt {
                    column: "column_mapping_columns.side",
                    value: format!("{:?}", other),
                })
            }
        }
    }

    Ok(mappings)
}

/// Resolver over an organization's stored mappings
pub async fn load_resolver(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
    delimiter: &str,
) -> MatchResult<ColumnMappingResolver> {
    Ok(ColumnMappingResolver::new(
        load_mappings(conn, organization_id).await?,
        delimiter,
    ))
}

/// Stored mapping lookup; see [`ColumnMappingResolver::get_column_mapping`]
pub async fn get_column_mapping(
    conn: &mut SqliteConnection,
    raw_columns: &[&str],
    organization_id: OrganizationId,
    side: MappingSide,
) -> MatchResult<Option<(Vec<String>, u8)>> {
    let resolver = load_resolver(conn, organization_id, " ").await?;
    Ok(resolver.get_column_mapping(raw_columns, organization_id, side))
}

async fn insert_mapping_column(
    conn: &mut SqliteConnection,
    mapping_id: Uuid,
    column: &Column,
    side: &str,
    position: usize,
) -> MatchResult<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO column_mapping_columns (mapping_id, column_id, side, position) VALUES (?, ?, ?, ?)",
    )
    .bind(mapping_id.to_string())
    .bind(column.id.to_string())
    .bind(side)
    .bind(position as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Store user-defined mappings for an organization
///
/// Existing mappings that use any of a request's raw columns are replaced.
/// Targets that are not canonical building fields are registered as
/// extra-data columns.
pub async fn create_mappings(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
    requests: &[MappingRequest],
) -> MatchResult<Vec<ColumnMapping>> {
    let mut created = Vec::with_capacity(requests.len());

    for request in requests {
        if request.from_field.is_empty() || request.from_field.iter().any(|f| is_blank_str(f)) {
            return Err(MatchError::InvalidInput(format!(
                "mapping to '{}' has a blank raw column",
                request.to_field
            )));
        }
        if is_blank_str(&request.to_field) {
            return Err(MatchError::InvalidInput(format!(
                "mapping from {:?} has a blank target",
                request.from_field
            )));
        }

        let mut raw = Vec::with_capacity(request.from_field.len());
        for name in &request.from_field {
            raw.push(get_or_create_column(conn, organization_id, name, None, false).await?);
        }
        let is_extra_data = request.to_field.parse::<BuildingField>().is_err();
        let mapped = get_or_create_column(
            conn,
            organization_id,
            &request.to_field,
            request.to_table_name.as_deref(),
            is_extra_data,
        )
        .await?;

        for column in &raw {
            sqlx::query(
                r#"
                DELETE FROM column_mappings
                WHERE super_organization_id = ?
                  AND id IN (
                      SELECT mapping_id FROM column_mapping_columns
                      WHERE column_id = ? AND side = 'raw'
                  )
                "#,
            )
            .bind(organization_id.to_string())
            .bind(column.id.to_string())
            .execute(&mut *conn)
            .await?;
        }

        let mapping = ColumnMapping::new(Some(organization_id), raw, vec![mapped]);
        sqlx::query("INSERT INTO column_mappings (id, super_organization_id) VALUES (?, ?)")
            .bind(mapping.id.to_string())
            .bind(organization_id.to_string())
            .execute(&mut *conn)
            .await?;
        for (position, column) in mapping.column_raw.iter().enumerate() {
            insert_mapping_column(conn, mapping.id, column, "raw", position).await?;
        }
        for (position, column) in mapping.column_mapped.iter().enumerate() {
            insert_mapping_column(conn, mapping.id, column, "mapped", position).await?;
        }

        created.push(mapping);
    }

    info!(
        organization = %organization_id,
        mappings = created.len(),
        "Saved column mappings"
    );
    Ok(created)
}

/// Make sure every extra-data key has a column in the organization's registry
///
/// Returns the number of newly registered columns.
pub async fn register_extra_data_columns<'a>(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
    keys: impl IntoIterator<Item = &'a String>,
) -> MatchResult<usize> {
    let mut registered = 0;
    for key in keys {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM columns WHERE organization_id = ? AND column_name = ? AND is_extra_data = 1",
        )
        .bind(organization_id.to_string())
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        if exists.is_some() {
            continue;
        }

        let column = Column {
            is_extra_data: true,
            ..Column::new(Some(organization_id), key.clone())
        };
        sqlx::query(
            r#"
            INSERT INTO columns (id, organization_id, column_name, is_extra_data, source_string_sha)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(column.id.to_string())
        .bind(organization_id.to_string())
        .bind(&column.column_name)
        .bind(column.source_string_sha())
        .execute(&mut *conn)
        .await?;
        registered += 1;
    }
    Ok(registered)
}

/// Extra-data column names known for an organization, sorted
pub async fn extra_data_column_names(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
) -> MatchResult<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT column_name FROM columns WHERE organization_id = ? AND is_extra_data = 1 ORDER BY column_name",
    )
    .bind(organization_id.to_string())
    .fetch_all(&mut *conn)
    .await?)
}
