//! Match service integration tests: manual match, unmatch, edits and lookups

mod support;

use seed_common::events::SeedEvent;
use seed_common::{OrganizationId, SnapshotId};
use seed_match::db::snapshots;
use seed_match::models::{BuildingField, ExtraData, MatchType};
use seed_match::{MatchError, TreeError};
use serde_json::json;
use std::collections::BTreeMap;
use support::{import_rows, portfolio_mappings, portfolio_rows, row, setup, TestContext};

/// Import two unrelated buildings and return their mapped snapshots
async fn two_buildings(ctx: &TestContext, org: OrganizationId) -> (SnapshotId, SnapshotId) {
    ctx.matches.create_mappings(org, &portfolio_mappings()).await.unwrap();
    let mut rows = portfolio_rows();
    rows.truncate(2);
    let summary = import_rows(ctx, org, "first", rows).await;
    (
        summary.buildings[0].snapshot.unwrap(),
        summary.buildings[1].snapshot.unwrap(),
    )
}

#[tokio::test]
async fn test_save_match_merges_tips() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, b) = two_buildings(&ctx, org).await;
    let canonical_a = ctx.matches.tip(a).await.unwrap().canonical_building.unwrap();
    let canonical_b = ctx.matches.tip(b).await.unwrap().canonical_building.unwrap();

    let mut rx = ctx.event_bus.subscribe();
    let outcome = ctx
        .matches
        .save_match(a, b, 0.8, None, MatchType::Manual)
        .await
        .unwrap();

    assert_eq!(outcome.canonical_building, canonical_a);
    assert_eq!(outcome.deactivated, Some(canonical_b));

    let tip = ctx.matches.tip(b).await.unwrap();
    assert_eq!(tip.id, outcome.merged);
    assert_eq!(tip.parents, vec![a, b]);
    assert_eq!(tip.confidence, Some(0.8));
    // First snapshot is the default
    assert_eq!(tip.populated(BuildingField::PropertyName), Some("University Inn"));
    assert_eq!(tip.field_sources.get(&BuildingField::PropertyName), Some(&a));

    match rx.try_recv().unwrap() {
        SeedEvent::SnapshotsMatched { first, second, merged, .. } => {
            assert_eq!((first, second, merged), (a, b, outcome.merged));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_save_match_with_default_second() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, b) = two_buildings(&ctx, org).await;

    let outcome = ctx
        .matches
        .save_match(a, b, 1.0, Some(b), MatchType::Manual)
        .await
        .unwrap();

    let tip = ctx.matches.tip(a).await.unwrap();
    assert_eq!(tip.id, outcome.merged);
    assert_eq!(tip.default_parent, Some(b));
    assert_eq!(tip.populated(BuildingField::PropertyName), Some("Rainier Tower"));
    assert_eq!(tip.field_sources.get(&BuildingField::PropertyName), Some(&b));
}

#[tokio::test]
async fn test_save_match_rejects_non_tip() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, b) = two_buildings(&ctx, org).await;
    ctx.matches.save_match(a, b, 1.0, None, MatchType::Manual).await.unwrap();

    let result = ctx.matches.save_match(a, b, 1.0, None, MatchType::Manual).await;
    assert!(matches!(result, Err(MatchError::Tree(TreeError::NotATip(_)))));
}

#[tokio::test]
async fn test_save_match_across_organizations_fails() {
    let ctx = setup().await;
    let org_a = OrganizationId::new();
    let org_b = OrganizationId::new();
    ctx.matches.create_mappings(org_a, &portfolio_mappings()).await.unwrap();
    ctx.matches.create_mappings(org_b, &portfolio_mappings()).await.unwrap();

    let rows = portfolio_rows();
    let a = import_rows(&ctx, org_a, "a", vec![rows[0].clone()]).await.buildings[0]
        .snapshot
        .unwrap();
    let b = import_rows(&ctx, org_b, "b", vec![rows[1].clone()]).await.buildings[0]
        .snapshot
        .unwrap();

    let result = ctx.matches.save_match(a, b, 1.0, None, MatchType::Manual).await;
    assert!(matches!(
        result,
        Err(MatchError::Tree(TreeError::OrganizationMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_unknown_snapshot() {
    let ctx = setup().await;
    let missing = SnapshotId::new();
    let result = ctx.matches.tip(missing).await;
    assert!(matches!(result, Err(MatchError::Tree(TreeError::UnknownSnapshot(id))) if id == missing));
}

#[tokio::test]
async fn test_unmatch_restores_both_buildings() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, b) = two_buildings(&ctx, org).await;
    let canonical_b = ctx.matches.tip(b).await.unwrap().canonical_building.unwrap();
    let outcome = ctx.matches.save_match(a, b, 1.0, None, MatchType::Manual).await.unwrap();

    let mut rx = ctx.event_bus.subscribe();
    let unmatched = ctx.matches.unmatch(b).await.unwrap();

    assert_eq!(unmatched.deleted, vec![outcome.merged]);
    assert!(unmatched.reactivated.contains(&canonical_b));
    assert_eq!(ctx.matches.tip(a).await.unwrap().id, a);
    assert_eq!(ctx.matches.tip(b).await.unwrap().id, b);

    let mut conn = ctx.db.acquire().await.unwrap();
    let tree = snapshots::load_tree(&mut conn, org).await.unwrap();
    assert!(!tree.contains(outcome.merged));
    assert_eq!(tree.active_tips().len(), 2);
    tree.validate().unwrap();
    drop(conn);

    assert!(matches!(rx.try_recv().unwrap(), SeedEvent::SnapshotUnmatched { snapshot, .. } if snapshot == b));
}

#[tokio::test]
async fn test_unmatch_never_matched() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, _) = two_buildings(&ctx, org).await;

    let result = ctx.matches.unmatch(a).await;
    assert!(matches!(result, Err(MatchError::Tree(TreeError::NotMatched(_)))));
}

#[tokio::test]
async fn test_update_snapshot_creates_edit_child() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, _) = two_buildings(&ctx, org).await;

    let mut fields = BTreeMap::new();
    fields.insert(BuildingField::PropertyName, "University Inn & Suites".to_string());
    let mut extra = ExtraData::new();
    extra.insert("Manager".to_string(), json!("J. Doe"));

    let child = ctx.matches.update_snapshot(a, fields, extra).await.unwrap();
    let tip = ctx.matches.tip(a).await.unwrap();
    assert_eq!(tip.id, child);
    assert_eq!(tip.parents, vec![a]);
    assert_eq!(tip.populated(BuildingField::PropertyName), Some("University Inn & Suites"));
    assert_eq!(tip.field_sources.get(&BuildingField::PropertyName), Some(&child));
    assert_eq!(tip.field_sources.get(&BuildingField::PmPropertyId), Some(&a));

    let (children, parents) = ctx.matches.lineage(a).await.unwrap();
    assert_eq!(children, vec![child]);
    assert!(parents.is_empty());

    let mut conn = ctx.db.acquire().await.unwrap();
    let names = seed_match::db::columns::extra_data_column_names(&mut conn, org).await.unwrap();
    assert!(names.contains(&"Manager".to_string()));
}

#[tokio::test]
async fn test_concatenated_mapping_import() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let mut requests = portfolio_mappings();
    requests.retain(|r| r.to_field != "address_line_1");
    requests.push(
        serde_json::from_value(json!({"from_field": ["Number", "Street"], "to_field": "address_line_1"})).unwrap(),
    );
    ctx.matches.create_mappings(org, &requests).await.unwrap();

    let summary = import_rows(
        &ctx,
        org,
        "concat",
        vec![row(&[("Property Id", "1"), ("Number", "123"), ("Street", " Main St ")])],
    )
    .await;

    let tip = ctx.matches.tip(summary.buildings[0].snapshot.unwrap()).await.unwrap();
    assert_eq!(tip.populated(BuildingField::AddressLine1), Some("123 Main St"));
}

#[tokio::test]
async fn test_lineage_across_a_match() {
    let ctx = setup().await;
    let org = OrganizationId::new();
    let (a, b) = two_buildings(&ctx, org).await;
    let outcome = ctx.matches.save_match(a, b, 1.0, None, MatchType::Manual).await.unwrap();

    let (children, parents) = ctx.matches.lineage(outcome.merged).await.unwrap();
    assert!(children.is_empty());
    assert_eq!(parents, vec![a, b]);

    let (children, parents) = ctx.matches.lineage(b).await.unwrap();
    assert_eq!(children, vec![outcome.merged]);
    assert!(parents.is_empty());
}
