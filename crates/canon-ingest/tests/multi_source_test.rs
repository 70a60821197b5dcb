//! End-to-end multi-source ingestion against the in-memory adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use canon_core::{
    new_v7, ApprovalEvent, CanonicalRecord, ChildRepository, DocumentHeader, EntityRepository,
    EpisodeTemplate, Error, HistoryRepository, IngestionJob, Repository, Result, SeriesProfile,
    SourceDocument, UnitOfWork,
};
use canon_db::MemoryStore;
use canon_ingest::{
    ingest_multi_source, CpuExecutor, DefaultSourceNormalizer, DefaultWeightingStrategy,
    HighestWeightConflictResolver, IngestionPipeline, MultiSourceRequest, NormalizedSource,
    RawSourceInput, SourceNormalizer, SourceScores,
};

fn profile(configuration: serde_json::Value) -> SeriesProfile {
    let now = Utc::now();
    SeriesProfile {
        id: new_v7(),
        slug: "morning-brief".into(),
        title: "Morning Brief".into(),
        description: None,
        configuration,
        created_at: now,
        updated_at: now,
    }
}

async fn store_with(profile: &SeriesProfile) -> MemoryStore {
    let store = MemoryStore::new();
    let mut uow = store.unit_of_work().unwrap();
    uow.series_profiles().add(profile).await.unwrap();
    uow.commit().await.unwrap();
    store
}

fn pipeline(normalizer: DefaultSourceNormalizer) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(normalizer),
        Arc::new(DefaultWeightingStrategy::new()),
        Arc::new(HighestWeightConflictResolver),
    )
}

fn request(sources: Vec<RawSourceInput>) -> MultiSourceRequest {
    MultiSourceRequest {
        raw_sources: sources,
        series_slug: "morning-brief".into(),
        requested_by: Some("editor@example.com".into()),
    }
}

async fn persisted_sources(store: &MemoryStore, record: &CanonicalRecord) -> Vec<SourceDocument> {
    let jobs = store.jobs_for_record(record.id).unwrap();
    assert_eq!(jobs.len(), 1);
    let mut uow = store.unit_of_work().unwrap();
    uow.source_documents().list_for(jobs[0].id).await.unwrap()
}

#[tokio::test]
async fn test_two_sources_heaviest_wins_and_loser_is_kept() {
    let profile = profile(json!({}));
    let store = store_with(&profile).await;
    let normalizer = DefaultSourceNormalizer::new()
        .with_override("research_notes", SourceScores::new(0.3, 0.3, 0.3));

    let sources = vec![
        RawSourceInput::new("transcript", "s3://ep1/transcript.txt", "Studio Transcript\nHost: hello"),
        RawSourceInput::new("research_notes", "file:///notes.md", "Producer Notes\n- check budget"),
    ];

    let mut uow = store.unit_of_work().unwrap();
    let record = ingest_multi_source(&mut uow, &profile, request(sources), &pipeline(normalizer))
        .await
        .unwrap();
    assert_eq!(record.title, "Studio Transcript");
    assert!(record.content.contains("<source_uri>s3://ep1/transcript.txt</source_uri>"));

    let persisted = persisted_sources(&store, &record).await;
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[0].source_uri, "s3://ep1/transcript.txt");
    assert!((persisted[0].weight - 0.87).abs() < 1e-9);
    assert_eq!(persisted[1].source_uri, "file:///notes.md");
    assert!((persisted[1].weight - 0.3).abs() < 1e-9);

    let block = &persisted[1].metadata["conflict_resolution"];
    assert_eq!(block["preferred_sources"], json!(["s3://ep1/transcript.txt"]));
    assert_eq!(block["rejected_sources"], json!(["file:///notes.md"]));
    let notes = block["resolution_notes"].as_str().unwrap();
    assert!(notes.contains("'Studio Transcript' selected as canonical (weight 0.870)"));
    assert!(notes.contains("'Producer Notes' rejected (weight 0.300)"));
    assert_eq!(persisted[0].metadata["conflict_resolution"], *block);

    let mut uow = store.unit_of_work().unwrap();
    let header = uow.headers().get(record.header_id).await.unwrap().unwrap();
    let priorities = &header.payload["provenance"]["source_priorities"];
    assert_eq!(priorities[0]["priority"], 1);
    assert_eq!(priorities[0]["source_uri"], "s3://ep1/transcript.txt");
    assert_eq!(priorities[1]["source_uri"], "file:///notes.md");
    assert_eq!(
        header.payload["provenance"]["reviewer_identities"],
        json!(["editor@example.com"])
    );

    let events = uow.approval_events().list_for(record.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].payload,
        json!({"sources": ["s3://ep1/transcript.txt", "file:///notes.md"]})
    );
}

#[tokio::test]
async fn test_single_source_has_no_conflicts() {
    let profile = profile(json!({}));
    let store = store_with(&profile).await;

    let mut uow = store.unit_of_work().unwrap();
    let record = ingest_multi_source(
        &mut uow,
        &profile,
        request(vec![RawSourceInput::new("brief", "file:///brief.md", "Weekly Brief")]),
        &pipeline(DefaultSourceNormalizer::new()),
    )
    .await
    .unwrap();

    let persisted = persisted_sources(&store, &record).await;
    assert_eq!(persisted.len(), 1);
    let block = &persisted[0].metadata["conflict_resolution"];
    assert_eq!(block["rejected_sources"], json!([]));
    assert!(block["resolution_notes"]
        .as_str()
        .unwrap()
        .ends_with("No conflicts to resolve."));
}

#[tokio::test]
async fn test_series_coefficients_change_the_winner() {
    // Freshness-only weighting favours the RSS item over the transcript.
    let profile = profile(json!({"weighting": {
        "quality_coefficient": 0,
        "freshness_coefficient": "1.0",
        "reliability_coefficient": 0
    }}));
    let store = store_with(&profile).await;

    let mut uow = store.unit_of_work().unwrap();
    let record = ingest_multi_source(
        &mut uow,
        &profile,
        request(vec![
            RawSourceInput::new("transcript", "s3://t", "Transcript"),
            RawSourceInput::new("rss", "https://feed/item", "Breaking Item"),
        ]),
        &pipeline(DefaultSourceNormalizer::new()),
    )
    .await
    .unwrap();

    assert_eq!(record.title, "Breaking Item");
    let persisted = persisted_sources(&store, &record).await;
    assert_eq!(persisted[1].weight, 1.0);
}

/// Fails the test if ingestion touches storage at all.
struct PanickingUnitOfWork;

#[async_trait]
impl UnitOfWork for PanickingUnitOfWork {
    fn series_profiles(&mut self) -> &mut dyn EntityRepository<SeriesProfile> {
        panic!("repository accessed")
    }
    fn series_profile_history(&mut self) -> &mut dyn HistoryRepository<SeriesProfile> {
        panic!("repository accessed")
    }
    fn episode_templates(&mut self) -> &mut dyn EntityRepository<EpisodeTemplate> {
        panic!("repository accessed")
    }
    fn episode_template_history(&mut self) -> &mut dyn HistoryRepository<EpisodeTemplate> {
        panic!("repository accessed")
    }
    fn headers(&mut self) -> &mut dyn Repository<DocumentHeader> {
        panic!("repository accessed")
    }
    fn records(&mut self) -> &mut dyn Repository<CanonicalRecord> {
        panic!("repository accessed")
    }
    fn ingestion_jobs(&mut self) -> &mut dyn Repository<IngestionJob> {
        panic!("repository accessed")
    }
    fn source_documents(&mut self) -> &mut dyn ChildRepository<SourceDocument> {
        panic!("repository accessed")
    }
    fn approval_events(&mut self) -> &mut dyn ChildRepository<ApprovalEvent> {
        panic!("repository accessed")
    }
    async fn flush(&mut self) -> Result<()> {
        panic!("flush called")
    }
    async fn commit(&mut self) -> Result<()> {
        panic!("commit called")
    }
    async fn rollback(&mut self) -> Result<()> {
        panic!("rollback called")
    }
}

#[tokio::test]
async fn test_empty_sources_fail_before_any_storage_call() {
    let profile = profile(json!({}));
    let mut uow = PanickingUnitOfWork;

    let err = ingest_multi_source(
        &mut uow,
        &profile,
        request(Vec::new()),
        &pipeline(DefaultSourceNormalizer::new()),
    )
    .await
    .unwrap_err();

    assert!(err.is_validation());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slug_mismatch_fails_before_any_storage_call() {
    let profile = profile(json!({}));
    let mut request = request(vec![RawSourceInput::new("rss", "https://f", "x")]);
    request.series_slug = "evening-brief".into();

    let err = ingest_multi_source(
        &mut PanickingUnitOfWork,
        &profile,
        request,
        &pipeline(DefaultSourceNormalizer::new()),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Series slug mismatch"));
}

/// Delegates to the reference normalizer but rejects one URI.
struct RejectingNormalizer {
    inner: DefaultSourceNormalizer,
    reject_uri: &'static str,
}

#[async_trait]
impl SourceNormalizer for RejectingNormalizer {
    async fn normalize(&self, raw: &RawSourceInput) -> Result<NormalizedSource> {
        if raw.source_uri == self.reject_uri {
            return Err(Error::Validation(format!("unreadable source {}", raw.source_uri)));
        }
        self.inner.normalize(raw).await
    }
}

#[tokio::test]
async fn test_normalization_failure_persists_nothing() {
    let profile = profile(json!({}));
    let store = store_with(&profile).await;
    let pipeline = IngestionPipeline::new(
        Arc::new(RejectingNormalizer {
            inner: DefaultSourceNormalizer::new(),
            reject_uri: "https://broken",
        }),
        Arc::new(DefaultWeightingStrategy::new()),
        Arc::new(HighestWeightConflictResolver),
    );

    let mut uow = store.unit_of_work().unwrap();
    let err = ingest_multi_source(
        &mut uow,
        &profile,
        request(vec![
            RawSourceInput::new("transcript", "s3://ok", "Fine"),
            RawSourceInput::new("rss", "https://broken", "???"),
        ]),
        &pipeline,
    )
    .await
    .unwrap_err();
    drop(uow);

    assert!(err.to_string().contains("unreadable source https://broken"));
    let counts = store.counts().unwrap();
    assert_eq!(counts.headers, 0);
    assert_eq!(counts.records, 0);
    assert_eq!(counts.jobs, 0);
    assert_eq!(counts.sources, 0);
    assert_eq!(counts.approvals, 0);
}

#[tokio::test]
async fn test_large_batch_on_worker_pool_keeps_input_order() {
    let profile = profile(json!({}));
    let store = store_with(&profile).await;
    let pipeline = IngestionPipeline::new(
        Arc::new(DefaultSourceNormalizer::new()),
        Arc::new(
            DefaultWeightingStrategy::new()
                .with_batch_threshold(4)
                .with_executor(CpuExecutor::pool(Some(2)).unwrap()),
        ),
        Arc::new(HighestWeightConflictResolver),
    );

    let types = ["rss", "brief", "transcript", "press_release", "research_notes"];
    let sources: Vec<RawSourceInput> = (0..20)
        .map(|i| {
            RawSourceInput::new(
                types[i % types.len()],
                format!("uri://{}", i),
                format!("Item {}", i),
            )
        })
        .collect();

    let mut uow = store.unit_of_work().unwrap();
    let record = ingest_multi_source(&mut uow, &profile, request(sources), &pipeline)
        .await
        .unwrap();

    // First transcript in input order wins the tie among transcripts.
    assert_eq!(record.title, "Item 2");
    let persisted = persisted_sources(&store, &record).await;
    let uris: Vec<String> = persisted.iter().map(|s| s.source_uri.clone()).collect();
    let expected: Vec<String> = (0..20).map(|i| format!("uri://{}", i)).collect();
    assert_eq!(uris, expected);
}
