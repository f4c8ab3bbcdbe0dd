//! Shared fixtures for seed-match integration tests

#![allow(dead_code)]

use seed_common::config::MatchingConfig;
use seed_common::db::init_memory_database;
use seed_common::events::EventBus;
use seed_common::OrganizationId;
use seed_match::models::{ImportFile, MappingRequest, SourceType};
use seed_match::services::RawRow;
use seed_match::{ImportOrchestrator, ImportSummary, MatchService};
use sqlx::SqlitePool;

pub struct TestContext {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub matches: MatchService,
    pub imports: ImportOrchestrator,
}

pub async fn setup() -> TestContext {
    let db = init_memory_database().await.unwrap();
    let event_bus = EventBus::new(1000);
    let config = MatchingConfig::default();
    TestContext {
        matches: MatchService::new(db.clone(), event_bus.clone(), config.clone()),
        imports: ImportOrchestrator::new(db.clone(), event_bus.clone(), config),
        db,
        event_bus,
    }
}

/// Portfolio Manager style headers mapped onto the canonical fields
pub fn portfolio_mappings() -> Vec<MappingRequest> {
    vec![
        MappingRequest::direct("Property Id", "pm_property_id"),
        MappingRequest::direct("Property Name", "property_name"),
        MappingRequest::direct("Address 1", "address_line_1"),
        MappingRequest::direct("Postal Code", "postal_code"),
        MappingRequest::direct("Year Built", "year_built"),
    ]
}

pub fn row(cells: &[(&str, &str)]) -> RawRow {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn portfolio_rows() -> Vec<RawRow> {
    vec![
        row(&[
            ("Property Id", "2264"),
            ("Property Name", "University Inn"),
            ("Address 1", "50 Willow Ave SE"),
            ("Postal Code", "94043"),
            ("Year Built", "1929"),
        ]),
        row(&[
            ("Property Id", "3311"),
            ("Property Name", "Rainier Tower"),
            ("Address 1", "1301 Fifth Avenue"),
            ("Postal Code", "98101"),
            ("Year Built", "1977"),
        ]),
        row(&[
            ("Property Id", "4457"),
            ("Property Name", "Greenfield Complex"),
            ("Address 1", "74 Orchard Street"),
            ("Postal Code", "10002"),
            ("Year Built", "1910"),
        ]),
    ]
}

/// Create a batch and import `rows` as one portfolio file
pub async fn import_rows(ctx: &TestContext, organization_id: OrganizationId, name: &str, rows: Vec<RawRow>) -> ImportSummary {
    let record = ctx.imports.create_import_record(organization_id, name).await.unwrap();
    let file = ImportFile::new(record.id, format!("{}.csv", name), SourceType::PortfolioRaw);
    ctx.imports.import_file(&record, file, rows).await.unwrap()
}
