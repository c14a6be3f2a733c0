//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `civica_test`)
//!   `TEST_DB_PASSWORD` (default: `civica_test`)

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use civica_db::entities::proposal::{self, ProposalStatus};
use civica_db::repositories::{ProposalRepository, ProposalVoteRepository};
use civica_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;
use serde_json::json;

async fn insert_published(repo: &ProposalRepository, author_id: i32) -> proposal::Model {
    repo.create(proposal::ActiveModel {
        title: Set("Pista ciclabile".to_string()),
        description: Set("Collegare il centro alla stazione".to_string()),
        category_id: Set(1),
        author_id: Set(author_id),
        status: Set(ProposalStatus::Pubblicata),
        additional_data: Set(json!({})),
        current_version: Set(1),
        vote_value: Set(0),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    })
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_apply_cleanly() {
    let db = TestDatabase::create_migrated().await.unwrap();
    let pending = civica_db::pending_migrations(&db.conn).await.unwrap();
    assert!(pending.is_empty());
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_vote_upsert_keeps_one_row_per_version() {
    let db = TestDatabase::create_migrated().await.unwrap();
    let proposals = ProposalRepository::new(db.connection());
    let votes = ProposalVoteRepository::new(db.connection());

    let p = insert_published(&proposals, 1).await;
    let conn = db.connection();

    votes.upsert(conn.as_ref(), 2, p.id, 1, 1, Utc::now().into()).await.unwrap();
    votes.upsert(conn.as_ref(), 2, p.id, 1, -1, Utc::now().into()).await.unwrap();
    votes.upsert(conn.as_ref(), 3, p.id, 1, -1, Utc::now().into()).await.unwrap();

    assert_eq!(votes.count_all_versions(p.id).await.unwrap(), 2);
    assert_eq!(votes.sum_for_version(conn.as_ref(), p.id, 1).await.unwrap(), -2);

    drop((proposals, votes, conn));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_revise_published_bumps_version_and_resets_votes() {
    let db = TestDatabase::create_migrated().await.unwrap();
    let proposals = ProposalRepository::new(db.connection());
    let votes = ProposalVoteRepository::new(db.connection());
    let conn = db.connection();

    let p = insert_published(&proposals, 1).await;
    votes.upsert(conn.as_ref(), 2, p.id, 1, 1, Utc::now().into()).await.unwrap();
    proposals.store_vote_value(conn.as_ref(), p.id, 1, 1).await.unwrap();

    let rows = proposals
        .revise_published(
            conn.as_ref(),
            p.id,
            1,
            civica_db::repositories::ContentRevision {
                title: "Pista ciclabile protetta".to_string(),
                description: "Collegare il centro alla stazione in sicurezza".to_string(),
                additional_data: json!({}),
                updated_at: Utc::now().into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let revised = proposals.get_by_id(p.id).await.unwrap();
    assert_eq!(revised.current_version, 2);
    assert_eq!(revised.vote_value, 0);
    assert_eq!(votes.sum_for_version(conn.as_ref(), p.id, 2).await.unwrap(), 0);
    assert_eq!(votes.count_all_versions(p.id).await.unwrap(), 1);

    // Wrong author: nothing changes
    let rows = proposals
        .revise_published(
            conn.as_ref(),
            p.id,
            99,
            civica_db::repositories::ContentRevision {
                title: "Hijacked title".to_string(),
                description: "Hijacked description".to_string(),
                additional_data: json!({}),
                updated_at: Utc::now().into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(rows, 0);

    drop((proposals, votes, conn));
    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
