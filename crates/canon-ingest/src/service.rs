//! Single-record ingestion: persist one canonical document and its sources.
//!
//! Everything is written through one unit of work and committed once. On any
//! failure the unit of work is rolled back, so either every row lands or none
//! does.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use canon_core::defaults::{CAPTURE_CONTEXT, INITIAL_APPROVAL_NOTE};
use canon_core::{
    attach_provenance, new_v7, parse_header, ApprovalEvent, ApprovalState, CanonicalRecord,
    DocumentHeader, IngestionJob, IngestionRequest, IngestionStatus, Provenance, RecordStatus,
    Result, SeriesProfile, SourceDocument, UnitOfWork,
};

/// Ingest `request` as a new canonical record owned by `profile`.
///
/// Writes, in order: header, record, completed job, one source document per
/// input (in input order) and the initial draft approval event.
pub async fn ingest_sources(
    uow: &mut dyn UnitOfWork,
    profile: &SeriesProfile,
    request: IngestionRequest,
) -> Result<CanonicalRecord> {
    let start = Instant::now();
    let now = Utc::now();

    // Header problems are validation failures and must not touch storage.
    let header = build_header(&request, now)?;

    match write_records(uow, profile, &request, header, now).await {
        Ok(record) => {
            info!(
                subsystem = "ingest",
                component = "service",
                op = "ingest_sources",
                record_id = %record.id,
                series_slug = %profile.slug,
                source_count = request.sources.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Ingested sources into canonical record"
            );
            Ok(record)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(
                    subsystem = "ingest",
                    component = "service",
                    op = "ingest_sources",
                    error = %rollback_err,
                    "Rollback after failed ingestion also failed"
                );
            }
            warn!(
                subsystem = "ingest",
                component = "service",
                op = "ingest_sources",
                series_slug = %profile.slug,
                error = %e,
                "Ingestion rolled back"
            );
            Err(e)
        }
    }
}

fn build_header(request: &IngestionRequest, now: DateTime<Utc>) -> Result<DocumentHeader> {
    let parsed = parse_header(&request.document)?;
    let reviewers: Vec<String> = request.requested_by.iter().cloned().collect();
    let provenance = Provenance::new(CAPTURE_CONTEXT, now, &reviewers, &request.sources);

    Ok(DocumentHeader {
        id: new_v7(),
        title: parsed.title,
        payload: attach_provenance(&parsed.payload, &provenance)?,
        raw_document: request.document.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn write_records(
    uow: &mut dyn UnitOfWork,
    profile: &SeriesProfile,
    request: &IngestionRequest,
    header: DocumentHeader,
    now: DateTime<Utc>,
) -> Result<CanonicalRecord> {
    let record = CanonicalRecord {
        id: new_v7(),
        series_profile_id: profile.id,
        header_id: header.id,
        title: header.title.clone(),
        content: header.raw_document.clone(),
        status: RecordStatus::Draft,
        approval_state: ApprovalState::Draft,
        created_at: now,
        updated_at: now,
    };
    let job = IngestionJob {
        id: new_v7(),
        series_profile_id: profile.id,
        target_record_id: Some(record.id),
        status: IngestionStatus::Completed,
        requested_at: now,
        started_at: Some(now),
        completed_at: Some(now),
        error_message: None,
        created_at: now,
        updated_at: now,
    };

    uow.headers().add(&header).await?;
    uow.flush().await?;

    uow.records().add(&record).await?;
    uow.ingestion_jobs().add(&job).await?;
    for source in source_documents(request, job.id, record.id, now) {
        uow.source_documents().add(&source).await?;
    }
    uow.flush().await?;

    uow.approval_events()
        .add(&initial_approval_event(record.id, request, now))
        .await?;
    uow.commit().await?;

    debug!(
        subsystem = "ingest",
        component = "service",
        op = "write_records",
        record_id = %record.id,
        job_id = %job.id,
        "Committed ingestion job"
    );
    Ok(record)
}

fn source_documents(
    request: &IngestionRequest,
    job_id: Uuid,
    record_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<SourceDocument> {
    request
        .sources
        .iter()
        .map(|source| SourceDocument {
            id: new_v7(),
            ingestion_job_id: job_id,
            canonical_record_id: Some(record_id),
            source_type: source.source_type.clone(),
            source_uri: source.source_uri.clone(),
            weight: source.weight,
            content_hash: source.content_hash.clone(),
            metadata: serde_json::Value::Object(source.metadata.clone()),
            created_at: now,
        })
        .collect()
}

fn initial_approval_event(
    record_id: Uuid,
    request: &IngestionRequest,
    now: DateTime<Utc>,
) -> ApprovalEvent {
    let uris: Vec<&str> = request.sources.iter().map(|s| s.source_uri.as_str()).collect();
    ApprovalEvent {
        id: new_v7(),
        canonical_record_id: record_id,
        actor: request.requested_by.clone(),
        from_state: None,
        to_state: ApprovalState::Draft,
        note: Some(INITIAL_APPROVAL_NOTE.to_string()),
        payload: json!({ "sources": uris }),
        created_at: now,
    }
}
