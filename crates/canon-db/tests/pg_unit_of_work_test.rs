//! PostgreSQL unit-of-work integration tests.
//!
//! Require a running PostgreSQL server (see `DATABASE_URL`).
//! Run with: `cargo test -p canon-db -- --ignored`

use chrono::Utc;
use serde_json::json;

use canon_core::{
    new_v7, ApprovalState, CanonicalRecord, DocumentHeader, HistoryEntry, RecordStatus,
    SeriesProfile, UnitOfWork,
};
use canon_db::test_fixtures::TestDatabase;

fn profile(slug: &str) -> SeriesProfile {
    let now = Utc::now();
    SeriesProfile {
        id: new_v7(),
        slug: slug.to_string(),
        title: "Morning Brief".to_string(),
        description: Some("Daily news".to_string()),
        configuration: json!({"weighting": {"quality_coefficient": 0.6}}),
        created_at: now,
        updated_at: now,
    }
}

fn history(parent_id: uuid::Uuid, revision: i32) -> HistoryEntry {
    HistoryEntry {
        id: new_v7(),
        parent_id,
        revision,
        actor: Some("editor@example.com".to_string()),
        note: None,
        snapshot: json!({"revision": revision}),
        created_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
async fn test_profile_and_history_round_trip() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let p = profile("morning-brief");

    let mut uow = test_db.db.unit_of_work();
    uow.series_profiles().add(&p).await.unwrap();
    uow.series_profile_history().append(&history(p.id, 1)).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = test_db.db.unit_of_work();
    let stored = uow.series_profiles().get(p.id).await.unwrap().unwrap();
    assert_eq!(stored.slug, "morning-brief");
    assert_eq!(stored.configuration, p.configuration);
    let latest = uow
        .series_profile_history()
        .get_latest_for(p.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.revision, 1);
    uow.rollback().await.unwrap();

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_duplicate_revision_reports_constraint() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let p = profile("evening-brief");

    let mut uow = test_db.db.unit_of_work();
    uow.series_profiles().add(&p).await.unwrap();
    uow.series_profile_history().append(&history(p.id, 1)).await.unwrap();
    let err = uow
        .series_profile_history()
        .append(&history(p.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some("uq_series_profile_history_revision"));
    uow.rollback().await.unwrap();

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_uncommitted_unit_of_work_leaves_nothing() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let p = profile("weekly");

    {
        let mut uow = test_db.db.unit_of_work();
        uow.series_profiles().add(&p).await.unwrap();
    }

    let mut uow = test_db.db.unit_of_work();
    assert!(uow.series_profiles().get(p.id).await.unwrap().is_none());
    uow.rollback().await.unwrap();

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_large_record_content_is_transparent() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let p = profile("long-form");
    let now = Utc::now();
    let body = "<p>Paragraph of canonical content.</p>\n".repeat(200);

    let header = DocumentHeader {
        id: new_v7(),
        title: "Long".to_string(),
        payload: json!({"title": "Long"}),
        raw_document: body.clone(),
        created_at: now,
        updated_at: now,
    };
    let record = CanonicalRecord {
        id: new_v7(),
        series_profile_id: p.id,
        header_id: header.id,
        title: "Long".to_string(),
        content: body.clone(),
        status: RecordStatus::Draft,
        approval_state: ApprovalState::Draft,
        created_at: now,
        updated_at: now,
    };

    let mut uow = test_db.db.unit_of_work();
    uow.series_profiles().add(&p).await.unwrap();
    uow.headers().add(&header).await.unwrap();
    uow.records().add(&record).await.unwrap();
    uow.commit().await.unwrap();

    let stored_text: String =
        sqlx::query_scalar("SELECT content FROM canonical_record WHERE id = $1")
            .bind(record.id)
            .fetch_one(&test_db.db.pool)
            .await
            .unwrap();
    assert_ne!(stored_text, body);

    let mut uow = test_db.db.unit_of_work();
    let loaded = uow.records().get(record.id).await.unwrap().unwrap();
    assert_eq!(loaded.content, body);
    let loaded_header = uow.headers().get(header.id).await.unwrap().unwrap();
    assert_eq!(loaded_header.raw_document, body);
    uow.rollback().await.unwrap();

    test_db.cleanup().await;
}
