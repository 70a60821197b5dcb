//! Optimistic locking against PostgreSQL.
//!
//! Require a running PostgreSQL server (see `DATABASE_URL`).
//! Run with: `cargo test -p canon-catalog -- --ignored`

use serde_json::json;

use canon_catalog::{
    create_series_profile, list_series_profile_history, update_series_profile, SeriesProfileData,
    SeriesProfileUpdate, UpdateSeriesProfileRequest,
};
use canon_core::{AuditInfo, Error};
use canon_db::test_fixtures::TestDatabase;

fn retitle(profile_id: uuid::Uuid, title: &str) -> UpdateSeriesProfileRequest {
    UpdateSeriesProfileRequest {
        profile_id,
        expected_revision: 1,
        data: SeriesProfileUpdate {
            title: title.into(),
            description: None,
            configuration: json!({}),
        },
        audit: AuditInfo::new(title),
    }
}

#[tokio::test]
#[ignore]
async fn test_parallel_updates_from_same_revision_admit_one_writer() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;

    let mut uow = test_db.db.unit_of_work();
    let (profile, _) = create_series_profile(
        &mut uow,
        SeriesProfileData {
            slug: "morning-brief".into(),
            title: "Morning Brief".into(),
            description: None,
            configuration: json!({}),
        },
        &AuditInfo::new("setup"),
    )
    .await
    .unwrap();

    let mut first = test_db.db.unit_of_work();
    let mut second = test_db.db.unit_of_work();
    let (a, b) = tokio::join!(
        update_series_profile(&mut first, retitle(profile.id, "first")),
        update_series_profile(&mut second, retitle(profile.id, "second")),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.into_iter().find_map(|r| r.err()).unwrap();
    // Depending on interleaving the loser sees the committed revision (stale)
    // or collides on the unique constraint (concurrent).
    assert!(matches!(loser, Error::RevisionConflict { .. }), "{loser}");

    let mut uow = test_db.db.unit_of_work();
    let history = list_series_profile_history(&mut uow, profile.id).await.unwrap();
    assert_eq!(history.iter().map(|h| h.revision).collect::<Vec<_>>(), vec![1, 2]);

    test_db.cleanup().await;
}
