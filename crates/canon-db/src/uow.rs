//! PostgreSQL unit of work and repository implementations.
//!
//! Statements execute eagerly inside one lazily-opened transaction, so
//! constraint violations surface on the write that caused them. `flush` is
//! only a sequencing point. Dropping a [`PgUnitOfWork`] with an open
//! transaction rolls it back.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgConnection, PgDatabaseError, PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use canon_core::{
    ApprovalEvent, CanonicalRecord, ChildRepository, DocumentHeader, EntityKind,
    EntityRepository, EpisodeTemplate, Error, HistoryEntry, HistoryRepository, IngestionJob,
    Repository, Result, SeriesProfile, SourceDocument, UnitOfWork, VersionedEntity,
};

use crate::compression::{decode_text, CompressionPolicy};

/// Map driver errors, turning constraint violations into [`Error::Integrity`].
pub fn map_db_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation
        ) {
            let detail = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail());
            let message = match detail {
                Some(detail) => format!("{} ({})", db.message(), detail),
                None => db.message().to_string(),
            };
            return Error::Integrity {
                constraint: db.constraint().map(str::to_string),
                message,
            };
        }
    }
    Error::Database(err)
}

/// One PostgreSQL transaction exposed through every repository trait.
pub struct PgUnitOfWork {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    finished: bool,
    compression: CompressionPolicy,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool, compression: CompressionPolicy) -> Self {
        Self {
            pool,
            tx: None,
            finished: false,
            compression,
        }
    }

    async fn conn(&mut self) -> Result<&mut PgConnection> {
        if self.finished {
            return Err(Error::Internal("unit of work already finished".to_string()));
        }
        if self.tx.is_none() {
            let tx = self.pool.begin().await.map_err(Error::Database)?;
            trace!(subsystem = "db", component = "uow", op = "begin", "Transaction opened");
            self.tx = Some(tx);
        }
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("transaction not open".to_string()))
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn profile_from_row(row: &PgRow) -> SeriesProfile {
    SeriesProfile {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        configuration: row.get("configuration"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn template_from_row(row: &PgRow) -> EpisodeTemplate {
    EpisodeTemplate {
        id: row.get("id"),
        series_profile_id: row.get("series_profile_id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        structure: row.get("structure"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn history_from_row(row: &PgRow) -> HistoryEntry {
    HistoryEntry {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        revision: row.get("revision"),
        actor: row.get("actor"),
        note: row.get("note"),
        snapshot: row.get("snapshot"),
        created_at: row.get("created_at"),
    }
}

fn header_from_row(row: PgRow) -> Result<DocumentHeader> {
    Ok(DocumentHeader {
        id: row.get("id"),
        title: row.get("title"),
        payload: row.get("payload"),
        raw_document: decode_text(
            "document_header.raw_document",
            row.get("raw_document"),
            row.get("raw_document_compressed"),
        )?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn record_from_row(row: PgRow) -> Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        id: row.get("id"),
        series_profile_id: row.get("series_profile_id"),
        header_id: row.get("header_id"),
        title: row.get("title"),
        content: decode_text(
            "canonical_record.content",
            row.get("content"),
            row.get("content_compressed"),
        )?,
        status: row.get::<String, _>("status").parse()?,
        approval_state: row.get::<String, _>("approval_state").parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn job_from_row(row: PgRow) -> Result<IngestionJob> {
    Ok(IngestionJob {
        id: row.get("id"),
        series_profile_id: row.get("series_profile_id"),
        target_record_id: row.get("target_record_id"),
        status: row.get::<String, _>("status").parse()?,
        requested_at: row.get("requested_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn source_from_row(row: &PgRow) -> SourceDocument {
    SourceDocument {
        id: row.get("id"),
        ingestion_job_id: row.get("ingestion_job_id"),
        canonical_record_id: row.get("canonical_record_id"),
        source_type: row.get("source_type"),
        source_uri: row.get("source_uri"),
        weight: row.get("weight"),
        content_hash: row.get("content_hash"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    }
}

fn approval_from_row(row: PgRow) -> Result<ApprovalEvent> {
    let from_state: Option<String> = row.get("from_state");
    Ok(ApprovalEvent {
        id: row.get("id"),
        canonical_record_id: row.get("canonical_record_id"),
        actor: row.get("actor"),
        from_state: from_state.map(|s| s.parse()).transpose()?,
        to_state: row.get::<String, _>("to_state").parse()?,
        note: row.get("note"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
    })
}

// =============================================================================
// SERIES PROFILES
// =============================================================================

#[async_trait]
impl Repository<SeriesProfile> for PgUnitOfWork {
    async fn add(&mut self, profile: &SeriesProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO series_profile (id, slug, title, description, configuration, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.slug)
        .bind(&profile.title)
        .bind(&profile.description)
        .bind(&profile.configuration)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<SeriesProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, title, description, configuration, created_at, updated_at
            FROM series_profile
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(profile_from_row))
    }
}

#[async_trait]
impl EntityRepository<SeriesProfile> for PgUnitOfWork {
    async fn update(&mut self, profile: &SeriesProfile) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE series_profile
            SET slug = $2, title = $3, description = $4, configuration = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(profile.id)
        .bind(&profile.slug)
        .bind(&profile.title)
        .bind(&profile.description)
        .bind(&profile.configuration)
        .bind(profile.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntityNotFound {
                kind: EntityKind::SeriesProfile.label(),
                id: profile.id,
            });
        }
        Ok(())
    }

    async fn list(&mut self, _parent: Option<Uuid>) -> Result<Vec<SeriesProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT id, slug, title, description, configuration, created_at, updated_at
            FROM series_profile
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(profile_from_row).collect())
    }

    async fn get_by_slug(&mut self, slug: &str, _parent: Option<Uuid>) -> Result<Option<SeriesProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, title, description, configuration, created_at, updated_at
            FROM series_profile
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(profile_from_row))
    }
}

// =============================================================================
// EPISODE TEMPLATES
// =============================================================================

#[async_trait]
impl Repository<EpisodeTemplate> for PgUnitOfWork {
    async fn add(&mut self, template: &EpisodeTemplate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO episode_template (id, series_profile_id, slug, title, description, structure, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id)
        .bind(template.series_profile_id)
        .bind(&template.slug)
        .bind(&template.title)
        .bind(&template.description)
        .bind(&template.structure)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<EpisodeTemplate>> {
        let row = sqlx::query(
            r#"
            SELECT id, series_profile_id, slug, title, description, structure, created_at, updated_at
            FROM episode_template
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(template_from_row))
    }
}

#[async_trait]
impl EntityRepository<EpisodeTemplate> for PgUnitOfWork {
    async fn update(&mut self, template: &EpisodeTemplate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE episode_template
            SET series_profile_id = $2, slug = $3, title = $4, description = $5,
                structure = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(template.id)
        .bind(template.series_profile_id)
        .bind(&template.slug)
        .bind(&template.title)
        .bind(&template.description)
        .bind(&template.structure)
        .bind(template.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntityNotFound {
                kind: EntityKind::EpisodeTemplate.label(),
                id: template.id,
            });
        }
        Ok(())
    }

    async fn list(&mut self, parent: Option<Uuid>) -> Result<Vec<EpisodeTemplate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, series_profile_id, slug, title, description, structure, created_at, updated_at
            FROM episode_template
            WHERE $1::uuid IS NULL OR series_profile_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(parent)
        .fetch_all(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(template_from_row).collect())
    }

    async fn get_by_slug(
        &mut self,
        slug: &str,
        parent: Option<Uuid>,
    ) -> Result<Option<EpisodeTemplate>> {
        let row = sqlx::query(
            r#"
            SELECT id, series_profile_id, slug, title, description, structure, created_at, updated_at
            FROM episode_template
            WHERE slug = $1 AND ($2::uuid IS NULL OR series_profile_id = $2)
            ORDER BY created_at, id
            LIMIT 1
            "#,
        )
        .bind(slug)
        .bind(parent)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(template_from_row))
    }
}

// =============================================================================
// HISTORY
// =============================================================================

#[async_trait]
impl<E: VersionedEntity> HistoryRepository<E> for PgUnitOfWork {
    async fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        let kind = E::KIND;
        let sql = format!(
            "INSERT INTO {} (id, {}, revision, actor, note, snapshot, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            kind.history_table(),
            kind.parent_column()
        );
        sqlx::query(&sql)
            .bind(entry.id)
            .bind(entry.parent_id)
            .bind(entry.revision)
            .bind(&entry.actor)
            .bind(&entry.note)
            .bind(&entry.snapshot)
            .bind(entry.created_at)
            .execute(self.conn().await?)
            .await
            .map_err(map_db_error)?;

        trace!(
            subsystem = "db",
            component = "uow",
            op = "append_history",
            db_table = kind.history_table(),
            entity_id = %entry.parent_id,
            revision = entry.revision,
            "History entry written"
        );
        Ok(())
    }

    async fn get_latest_for(&mut self, parent_id: Uuid) -> Result<Option<HistoryEntry>> {
        let kind = E::KIND;
        let sql = format!(
            "SELECT id, {col} AS parent_id, revision, actor, note, snapshot, created_at \
             FROM {table} WHERE {col} = $1 ORDER BY revision DESC LIMIT 1",
            col = kind.parent_column(),
            table = kind.history_table()
        );
        let row = sqlx::query(&sql)
            .bind(parent_id)
            .fetch_optional(self.conn().await?)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(history_from_row))
    }

    async fn list_for(&mut self, parent_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let kind = E::KIND;
        let sql = format!(
            "SELECT id, {col} AS parent_id, revision, actor, note, snapshot, created_at \
             FROM {table} WHERE {col} = $1 ORDER BY revision",
            col = kind.parent_column(),
            table = kind.history_table()
        );
        let rows = sqlx::query(&sql)
            .bind(parent_id)
            .fetch_all(self.conn().await?)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(history_from_row).collect())
    }

    async fn get_latest_revisions_for(&mut self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let kind = E::KIND;
        let sql = format!(
            "SELECT {col} AS parent_id, MAX(revision) AS revision \
             FROM {table} WHERE {col} = ANY($1) GROUP BY {col}",
            col = kind.parent_column(),
            table = kind.history_table()
        );
        let rows = sqlx::query(&sql)
            .bind(parent_ids)
            .fetch_all(self.conn().await?)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<Uuid, _>("parent_id"), r.get::<i32, _>("revision")))
            .collect())
    }
}

// =============================================================================
// INGESTION ROWS
// =============================================================================

#[async_trait]
impl Repository<DocumentHeader> for PgUnitOfWork {
    async fn add(&mut self, header: &DocumentHeader) -> Result<()> {
        let raw = self.compression.encode(&header.raw_document)?;
        sqlx::query(
            r#"
            INSERT INTO document_header (id, title, payload, raw_document, raw_document_compressed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(header.id)
        .bind(&header.title)
        .bind(&header.payload)
        .bind(&raw.text)
        .bind(&raw.compressed)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<DocumentHeader>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, payload, raw_document, raw_document_compressed, created_at, updated_at
            FROM document_header
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        row.map(header_from_row).transpose()
    }
}

#[async_trait]
impl Repository<CanonicalRecord> for PgUnitOfWork {
    async fn add(&mut self, record: &CanonicalRecord) -> Result<()> {
        let content = self.compression.encode(&record.content)?;
        sqlx::query(
            r#"
            INSERT INTO canonical_record (id, series_profile_id, header_id, title, content, content_compressed,
                                          status, approval_state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.series_profile_id)
        .bind(record.header_id)
        .bind(&record.title)
        .bind(&content.text)
        .bind(&content.compressed)
        .bind(record.status.as_str())
        .bind(record.approval_state.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<CanonicalRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, series_profile_id, header_id, title, content, content_compressed,
                   status, approval_state, created_at, updated_at
            FROM canonical_record
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        row.map(record_from_row).transpose()
    }
}

#[async_trait]
impl Repository<IngestionJob> for PgUnitOfWork {
    async fn add(&mut self, job: &IngestionJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_job (id, series_profile_id, target_record_id, status, requested_at,
                                       started_at, completed_at, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(job.series_profile_id)
        .bind(job.target_record_id)
        .bind(job.status.as_str())
        .bind(job.requested_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.error_message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<IngestionJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, series_profile_id, target_record_id, status, requested_at, started_at,
                   completed_at, error_message, created_at, updated_at
            FROM ingestion_job
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        row.map(job_from_row).transpose()
    }
}

#[async_trait]
impl Repository<SourceDocument> for PgUnitOfWork {
    async fn add(&mut self, source: &SourceDocument) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_document (id, ingestion_job_id, canonical_record_id, source_type, source_uri,
                                         weight, content_hash, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(source.id)
        .bind(source.ingestion_job_id)
        .bind(source.canonical_record_id)
        .bind(&source.source_type)
        .bind(&source.source_uri)
        .bind(source.weight)
        .bind(&source.content_hash)
        .bind(&source.metadata)
        .bind(source.created_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<SourceDocument>> {
        let row = sqlx::query(
            r#"
            SELECT id, ingestion_job_id, canonical_record_id, source_type, source_uri, weight,
                   content_hash, metadata, created_at
            FROM source_document
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(source_from_row))
    }
}

#[async_trait]
impl ChildRepository<SourceDocument> for PgUnitOfWork {
    async fn list_for(&mut self, job_id: Uuid) -> Result<Vec<SourceDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ingestion_job_id, canonical_record_id, source_type, source_uri, weight,
                   content_hash, metadata, created_at
            FROM source_document
            WHERE ingestion_job_id = $1
            ORDER BY seq
            "#,
        )
        .bind(job_id)
        .fetch_all(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(source_from_row).collect())
    }
}

#[async_trait]
impl Repository<ApprovalEvent> for PgUnitOfWork {
    async fn add(&mut self, event: &ApprovalEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_event (id, canonical_record_id, actor, from_state, to_state, note, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(event.canonical_record_id)
        .bind(&event.actor)
        .bind(event.from_state.map(|s| s.as_str()))
        .bind(event.to_state.as_str())
        .bind(&event.note)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(self.conn().await?)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<ApprovalEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, canonical_record_id, actor, from_state, to_state, note, payload, created_at
            FROM approval_event
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        row.map(approval_from_row).transpose()
    }
}

#[async_trait]
impl ChildRepository<ApprovalEvent> for PgUnitOfWork {
    async fn list_for(&mut self, record_id: Uuid) -> Result<Vec<ApprovalEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, canonical_record_id, actor, from_state, to_state, note, payload, created_at
            FROM approval_event
            WHERE canonical_record_id = $1
            ORDER BY seq
            "#,
        )
        .bind(record_id)
        .fetch_all(self.conn().await?)
        .await
        .map_err(Error::Database)?;
        rows.into_iter().map(approval_from_row).collect()
    }
}

// =============================================================================
// UNIT OF WORK
// =============================================================================

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn series_profiles(&mut self) -> &mut dyn EntityRepository<SeriesProfile> {
        self
    }

    fn series_profile_history(&mut self) -> &mut dyn HistoryRepository<SeriesProfile> {
        self
    }

    fn episode_templates(&mut self) -> &mut dyn EntityRepository<EpisodeTemplate> {
        self
    }

    fn episode_template_history(&mut self) -> &mut dyn HistoryRepository<EpisodeTemplate> {
        self
    }

    fn headers(&mut self) -> &mut dyn Repository<DocumentHeader> {
        self
    }

    fn records(&mut self) -> &mut dyn Repository<CanonicalRecord> {
        self
    }

    fn ingestion_jobs(&mut self) -> &mut dyn Repository<IngestionJob> {
        self
    }

    fn source_documents(&mut self) -> &mut dyn ChildRepository<SourceDocument> {
        self
    }

    fn approval_events(&mut self) -> &mut dyn ChildRepository<ApprovalEvent> {
        self
    }

    async fn flush(&mut self) -> Result<()> {
        self.conn().await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::Internal("unit of work already finished".to_string()));
        }
        self.finished = true;
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(map_db_error)?;
            debug!(subsystem = "db", component = "uow", op = "commit", "Transaction committed");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                warn!(
                    subsystem = "db",
                    component = "uow",
                    op = "rollback",
                    error = %e,
                    "Transaction rollback failed"
                );
                return Err(Error::Database(e));
            }
            debug!(subsystem = "db", component = "uow", op = "rollback", "Transaction rolled back");
        }
        Ok(())
    }
}
