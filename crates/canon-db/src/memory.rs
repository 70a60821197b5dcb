//! In-memory persistence adapter.
//!
//! Mirrors the PostgreSQL schema's primary-key, unique, foreign-key and check
//! constraints, using the same constraint names, so code written against
//! the port behaves identically on both adapters.
//!
//! Each [`MemoryUnitOfWork`] works on a private copy of the tables taken when
//! it begins and records every write. On commit the writes are replayed
//! against the store's current tables under one lock; if any write violates
//! a constraint nothing is published. Two units of work racing on the same
//! `(parent, revision)` therefore resolve exactly like they do in PostgreSQL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use canon_core::{
    ApprovalEvent, CanonicalRecord, ChildRepository, DocumentHeader, EntityKind,
    EntityRepository, EpisodeTemplate, Error, HistoryEntry, HistoryRepository, IngestionJob,
    Repository, Result, SeriesProfile, SourceDocument, UnitOfWork, UnitOfWorkFactory,
    VersionedEntity,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    series_profiles: Vec<SeriesProfile>,
    series_profile_history: Vec<HistoryEntry>,
    episode_templates: Vec<EpisodeTemplate>,
    episode_template_history: Vec<HistoryEntry>,
    headers: Vec<DocumentHeader>,
    records: Vec<CanonicalRecord>,
    jobs: Vec<IngestionJob>,
    sources: Vec<SourceDocument>,
    approvals: Vec<ApprovalEvent>,
}

#[derive(Debug, Clone)]
enum Write {
    AddProfile(SeriesProfile),
    UpdateProfile(SeriesProfile),
    AddTemplate(EpisodeTemplate),
    UpdateTemplate(EpisodeTemplate),
    AppendHistory(EntityKind, HistoryEntry),
    AddHeader(DocumentHeader),
    AddRecord(CanonicalRecord),
    AddJob(IngestionJob),
    AddSource(SourceDocument),
    AddApproval(ApprovalEvent),
}

fn unique_violation(constraint: &str, detail: String) -> Error {
    Error::Integrity {
        constraint: Some(constraint.to_string()),
        message: format!(
            "duplicate key value violates unique constraint \"{}\" ({})",
            constraint, detail
        ),
    }
}

fn foreign_key_violation(table: &str, constraint: &str, detail: String) -> Error {
    Error::Integrity {
        constraint: Some(constraint.to_string()),
        message: format!(
            "insert or update on table \"{}\" violates foreign key constraint \"{}\" ({})",
            table, constraint, detail
        ),
    }
}

fn check_violation(table: &str, constraint: &str) -> Error {
    Error::Integrity {
        constraint: Some(constraint.to_string()),
        message: format!(
            "new row for relation \"{}\" violates check constraint \"{}\"",
            table, constraint
        ),
    }
}

fn ensure_new_id(taken: bool, table: &str, id: Uuid) -> Result<()> {
    if taken {
        return Err(unique_violation(
            &format!("{}_pkey", table),
            format!("Key (id)=({}) already exists.", id),
        ));
    }
    Ok(())
}

fn ensure_parent(exists: bool, table: &str, constraint: &str, column: &str, id: Uuid) -> Result<()> {
    if !exists {
        return Err(foreign_key_violation(
            table,
            constraint,
            format!("Key ({})=({}) is not present.", column, id),
        ));
    }
    Ok(())
}

impl Tables {
    fn history(&self, kind: EntityKind) -> &[HistoryEntry] {
        match kind {
            EntityKind::SeriesProfile => &self.series_profile_history,
            EntityKind::EpisodeTemplate => &self.episode_template_history,
        }
    }

    fn has_profile(&self, id: Uuid) -> bool {
        self.series_profiles.iter().any(|p| p.id == id)
    }

    fn has_record(&self, id: Uuid) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    fn apply(&mut self, write: &Write) -> Result<()> {
        match write {
            Write::AddProfile(profile) => {
                ensure_new_id(self.has_profile(profile.id), "series_profile", profile.id)?;
                self.ensure_profile_slug_free(profile)?;
                self.series_profiles.push(profile.clone());
            }
            Write::UpdateProfile(profile) => {
                let idx = self
                    .series_profiles
                    .iter()
                    .position(|p| p.id == profile.id)
                    .ok_or(Error::EntityNotFound {
                        kind: EntityKind::SeriesProfile.label(),
                        id: profile.id,
                    })?;
                self.ensure_profile_slug_free(profile)?;
                self.series_profiles[idx] = profile.clone();
            }
            Write::AddTemplate(template) => {
                ensure_new_id(
                    self.episode_templates.iter().any(|t| t.id == template.id),
                    "episode_template",
                    template.id,
                )?;
                self.ensure_template_valid(template)?;
                self.episode_templates.push(template.clone());
            }
            Write::UpdateTemplate(template) => {
                let idx = self
                    .episode_templates
                    .iter()
                    .position(|t| t.id == template.id)
                    .ok_or(Error::EntityNotFound {
                        kind: EntityKind::EpisodeTemplate.label(),
                        id: template.id,
                    })?;
                self.ensure_template_valid(template)?;
                self.episode_templates[idx] = template.clone();
            }
            Write::AppendHistory(kind, entry) => {
                let parent_exists = match kind {
                    EntityKind::SeriesProfile => self.has_profile(entry.parent_id),
                    EntityKind::EpisodeTemplate => {
                        self.episode_templates.iter().any(|t| t.id == entry.parent_id)
                    }
                };
                let rows = self.history(*kind);
                ensure_new_id(
                    rows.iter().any(|h| h.id == entry.id),
                    kind.history_table(),
                    entry.id,
                )?;
                if entry.revision < 1 {
                    return Err(check_violation(
                        kind.history_table(),
                        &format!("ck_{}_revision", kind.history_table()),
                    ));
                }
                ensure_parent(
                    parent_exists,
                    kind.history_table(),
                    &format!("fk_{}_parent", kind.history_table()),
                    kind.parent_column(),
                    entry.parent_id,
                )?;
                if rows
                    .iter()
                    .any(|h| h.parent_id == entry.parent_id && h.revision == entry.revision)
                {
                    return Err(unique_violation(
                        kind.revision_constraint(),
                        format!(
                            "Key ({}, revision)=({}, {}) already exists.",
                            kind.parent_column(),
                            entry.parent_id,
                            entry.revision
                        ),
                    ));
                }
                match kind {
                    EntityKind::SeriesProfile => self.series_profile_history.push(entry.clone()),
                    EntityKind::EpisodeTemplate => {
                        self.episode_template_history.push(entry.clone())
                    }
                }
            }
            Write::AddHeader(header) => {
                ensure_new_id(
                    self.headers.iter().any(|h| h.id == header.id),
                    "document_header",
                    header.id,
                )?;
                self.headers.push(header.clone());
            }
            Write::AddRecord(record) => {
                ensure_new_id(self.has_record(record.id), "canonical_record", record.id)?;
                ensure_parent(
                    self.has_profile(record.series_profile_id),
                    "canonical_record",
                    "fk_canonical_record_profile",
                    "series_profile_id",
                    record.series_profile_id,
                )?;
                ensure_parent(
                    self.headers.iter().any(|h| h.id == record.header_id),
                    "canonical_record",
                    "fk_canonical_record_header",
                    "header_id",
                    record.header_id,
                )?;
                self.records.push(record.clone());
            }
            Write::AddJob(job) => {
                ensure_new_id(
                    self.jobs.iter().any(|j| j.id == job.id),
                    "ingestion_job",
                    job.id,
                )?;
                ensure_parent(
                    self.has_profile(job.series_profile_id),
                    "ingestion_job",
                    "fk_ingestion_job_profile",
                    "series_profile_id",
                    job.series_profile_id,
                )?;
                if let Some(record_id) = job.target_record_id {
                    ensure_parent(
                        self.has_record(record_id),
                        "ingestion_job",
                        "fk_ingestion_job_record",
                        "target_record_id",
                        record_id,
                    )?;
                }
                self.jobs.push(job.clone());
            }
            Write::AddSource(source) => {
                ensure_new_id(
                    self.sources.iter().any(|s| s.id == source.id),
                    "source_document",
                    source.id,
                )?;
                ensure_parent(
                    self.jobs.iter().any(|j| j.id == source.ingestion_job_id),
                    "source_document",
                    "fk_source_document_job",
                    "ingestion_job_id",
                    source.ingestion_job_id,
                )?;
                if let Some(record_id) = source.canonical_record_id {
                    ensure_parent(
                        self.has_record(record_id),
                        "source_document",
                        "fk_source_document_record",
                        "canonical_record_id",
                        record_id,
                    )?;
                }
                if !(0.0..=1.0).contains(&source.weight) {
                    return Err(check_violation(
                        "source_document",
                        "ck_source_document_weight",
                    ));
                }
                self.sources.push(source.clone());
            }
            Write::AddApproval(event) => {
                ensure_new_id(
                    self.approvals.iter().any(|a| a.id == event.id),
                    "approval_event",
                    event.id,
                )?;
                ensure_parent(
                    self.has_record(event.canonical_record_id),
                    "approval_event",
                    "fk_approval_event_record",
                    "canonical_record_id",
                    event.canonical_record_id,
                )?;
                self.approvals.push(event.clone());
            }
        }
        Ok(())
    }

    fn ensure_profile_slug_free(&self, profile: &SeriesProfile) -> Result<()> {
        if self
            .series_profiles
            .iter()
            .any(|p| p.slug == profile.slug && p.id != profile.id)
        {
            return Err(unique_violation(
                "uq_series_profile_slug",
                format!("Key (slug)=({}) already exists.", profile.slug),
            ));
        }
        Ok(())
    }

    fn ensure_template_valid(&self, template: &EpisodeTemplate) -> Result<()> {
        ensure_parent(
            self.has_profile(template.series_profile_id),
            "episode_template",
            "fk_episode_template_profile",
            "series_profile_id",
            template.series_profile_id,
        )?;
        if self.episode_templates.iter().any(|t| {
            t.series_profile_id == template.series_profile_id
                && t.slug == template.slug
                && t.id != template.id
        }) {
            return Err(unique_violation(
                "uq_episode_template_profile_slug",
                format!(
                    "Key (series_profile_id, slug)=({}, {}) already exists.",
                    template.series_profile_id, template.slug
                ),
            ));
        }
        Ok(())
    }
}

/// Row counts per table, for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub series_profiles: usize,
    pub series_profile_history: usize,
    pub episode_templates: usize,
    pub episode_template_history: usize,
    pub headers: usize,
    pub records: usize,
    pub jobs: usize,
    pub sources: usize,
    pub approvals: usize,
}

/// Shared in-memory database. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Open a unit of work over a private copy of the current tables.
    pub fn unit_of_work(&self) -> Result<MemoryUnitOfWork> {
        let working = self.lock()?.clone();
        Ok(MemoryUnitOfWork {
            store: self.clone(),
            working,
            pending: Vec::new(),
            finished: false,
        })
    }

    /// Committed ingestion jobs that produced `record_id`.
    pub fn jobs_for_record(&self, record_id: Uuid) -> Result<Vec<IngestionJob>> {
        Ok(self
            .lock()?
            .jobs
            .iter()
            .filter(|j| j.target_record_id == Some(record_id))
            .cloned()
            .collect())
    }

    pub fn counts(&self) -> Result<TableCounts> {
        let tables = self.lock()?;
        Ok(TableCounts {
            series_profiles: tables.series_profiles.len(),
            series_profile_history: tables.series_profile_history.len(),
            episode_templates: tables.episode_templates.len(),
            episode_template_history: tables.episode_template_history.len(),
            headers: tables.headers.len(),
            records: tables.records.len(),
            jobs: tables.jobs.len(),
            sources: tables.sources.len(),
            approvals: tables.approvals.len(),
        })
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(self.unit_of_work()?))
    }
}

/// Unit of work over a [`MemoryStore`].
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    working: Tables,
    pending: Vec<Write>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(Error::Internal("unit of work already finished".to_string()));
        }
        Ok(())
    }

    fn write(&mut self, write: Write) -> Result<()> {
        self.ensure_open()?;
        self.working.apply(&write)?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl Repository<SeriesProfile> for MemoryUnitOfWork {
    async fn add(&mut self, profile: &SeriesProfile) -> Result<()> {
        self.write(Write::AddProfile(profile.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<SeriesProfile>> {
        self.ensure_open()?;
        Ok(self.working.series_profiles.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl EntityRepository<SeriesProfile> for MemoryUnitOfWork {
    async fn update(&mut self, profile: &SeriesProfile) -> Result<()> {
        self.write(Write::UpdateProfile(profile.clone()))
    }

    async fn list(&mut self, _parent: Option<Uuid>) -> Result<Vec<SeriesProfile>> {
        self.ensure_open()?;
        Ok(self.working.series_profiles.clone())
    }

    async fn get_by_slug(&mut self, slug: &str, _parent: Option<Uuid>) -> Result<Option<SeriesProfile>> {
        self.ensure_open()?;
        Ok(self
            .working
            .series_profiles
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl Repository<EpisodeTemplate> for MemoryUnitOfWork {
    async fn add(&mut self, template: &EpisodeTemplate) -> Result<()> {
        self.write(Write::AddTemplate(template.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<EpisodeTemplate>> {
        self.ensure_open()?;
        Ok(self.working.episode_templates.iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl EntityRepository<EpisodeTemplate> for MemoryUnitOfWork {
    async fn update(&mut self, template: &EpisodeTemplate) -> Result<()> {
        self.write(Write::UpdateTemplate(template.clone()))
    }

    async fn list(&mut self, parent: Option<Uuid>) -> Result<Vec<EpisodeTemplate>> {
        self.ensure_open()?;
        Ok(self
            .working
            .episode_templates
            .iter()
            .filter(|t| parent.map_or(true, |p| t.series_profile_id == p))
            .cloned()
            .collect())
    }

    async fn get_by_slug(
        &mut self,
        slug: &str,
        parent: Option<Uuid>,
    ) -> Result<Option<EpisodeTemplate>> {
        self.ensure_open()?;
        Ok(self
            .working
            .episode_templates
            .iter()
            .find(|t| t.slug == slug && parent.map_or(true, |p| t.series_profile_id == p))
            .cloned())
    }
}

#[async_trait]
impl<E: VersionedEntity> HistoryRepository<E> for MemoryUnitOfWork {
    async fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.write(Write::AppendHistory(E::KIND, entry.clone()))
    }

    async fn get_latest_for(&mut self, parent_id: Uuid) -> Result<Option<HistoryEntry>> {
        self.ensure_open()?;
        Ok(self
            .working
            .history(E::KIND)
            .iter()
            .filter(|h| h.parent_id == parent_id)
            .max_by_key(|h| h.revision)
            .cloned())
    }

    async fn list_for(&mut self, parent_id: Uuid) -> Result<Vec<HistoryEntry>> {
        self.ensure_open()?;
        let mut entries: Vec<HistoryEntry> = self
            .working
            .history(E::KIND)
            .iter()
            .filter(|h| h.parent_id == parent_id)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.revision);
        Ok(entries)
    }

    async fn get_latest_revisions_for(&mut self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>> {
        self.ensure_open()?;
        let mut latest = HashMap::new();
        for entry in self.working.history(E::KIND) {
            if parent_ids.contains(&entry.parent_id) {
                let slot = latest.entry(entry.parent_id).or_insert(entry.revision);
                *slot = (*slot).max(entry.revision);
            }
        }
        Ok(latest)
    }
}

#[async_trait]
impl Repository<DocumentHeader> for MemoryUnitOfWork {
    async fn add(&mut self, header: &DocumentHeader) -> Result<()> {
        self.write(Write::AddHeader(header.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<DocumentHeader>> {
        self.ensure_open()?;
        Ok(self.working.headers.iter().find(|h| h.id == id).cloned())
    }
}

#[async_trait]
impl Repository<CanonicalRecord> for MemoryUnitOfWork {
    async fn add(&mut self, record: &CanonicalRecord) -> Result<()> {
        self.write(Write::AddRecord(record.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<CanonicalRecord>> {
        self.ensure_open()?;
        Ok(self.working.records.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl Repository<IngestionJob> for MemoryUnitOfWork {
    async fn add(&mut self, job: &IngestionJob) -> Result<()> {
        self.write(Write::AddJob(job.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<IngestionJob>> {
        self.ensure_open()?;
        Ok(self.working.jobs.iter().find(|j| j.id == id).cloned())
    }
}

#[async_trait]
impl Repository<SourceDocument> for MemoryUnitOfWork {
    async fn add(&mut self, source: &SourceDocument) -> Result<()> {
        self.write(Write::AddSource(source.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<SourceDocument>> {
        self.ensure_open()?;
        Ok(self.working.sources.iter().find(|s| s.id == id).cloned())
    }
}

#[async_trait]
impl ChildRepository<SourceDocument> for MemoryUnitOfWork {
    async fn list_for(&mut self, job_id: Uuid) -> Result<Vec<SourceDocument>> {
        self.ensure_open()?;
        Ok(self
            .working
            .sources
            .iter()
            .filter(|s| s.ingestion_job_id == job_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Repository<ApprovalEvent> for MemoryUnitOfWork {
    async fn add(&mut self, event: &ApprovalEvent) -> Result<()> {
        self.write(Write::AddApproval(event.clone()))
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<ApprovalEvent>> {
        self.ensure_open()?;
        Ok(self.working.approvals.iter().find(|a| a.id == id).cloned())
    }
}

#[async_trait]
impl ChildRepository<ApprovalEvent> for MemoryUnitOfWork {
    async fn list_for(&mut self, record_id: Uuid) -> Result<Vec<ApprovalEvent>> {
        self.ensure_open()?;
        Ok(self
            .working
            .approvals
            .iter()
            .filter(|a| a.canonical_record_id == record_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
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
        self.ensure_open()
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.finished = true;
        let pending = std::mem::take(&mut self.pending);

        let mut tables = self.store.lock()?;
        let mut next = tables.clone();
        for write in &pending {
            if let Err(e) = next.apply(write) {
                warn!(
                    subsystem = "db",
                    component = "memory_uow",
                    op = "commit",
                    constraint = e.constraint().unwrap_or_default(),
                    error = %e,
                    "Commit rejected, no writes published"
                );
                return Err(e);
            }
        }
        *tables = next;
        debug!(
            subsystem = "db",
            component = "memory_uow",
            op = "commit",
            writes = pending.len(),
            "Unit of work committed"
        );
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn profile(slug: &str) -> SeriesProfile {
        let now = Utc::now();
        SeriesProfile {
            id: Uuid::now_v7(),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            description: None,
            configuration: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn history(parent_id: Uuid, revision: i32) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::now_v7(),
            parent_id,
            revision,
            actor: Some("tester".into()),
            note: None,
            snapshot: json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work().unwrap();
        let p = profile("daily");
        uow.series_profiles().add(&p).await.unwrap();

        assert_eq!(store.counts().unwrap().series_profiles, 0);
        uow.commit().await.unwrap();
        assert_eq!(store.counts().unwrap().series_profiles, 1);
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut uow = store.unit_of_work().unwrap();
            uow.series_profiles().add(&profile("daily")).await.unwrap();
        }
        assert_eq!(store.counts().unwrap(), TableCounts::default());
    }

    #[tokio::test]
    async fn test_unit_of_work_reads_its_own_writes() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work().unwrap();
        let p = profile("daily");
        uow.series_profiles().add(&p).await.unwrap();
        let found = uow.series_profiles().get_by_slug("daily", None).await.unwrap();
        assert_eq!(found, Some(p));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_integrity_error() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work().unwrap();
        uow.series_profiles().add(&profile("daily")).await.unwrap();
        let err = uow.series_profiles().add(&profile("daily")).await.unwrap_err();
        assert_eq!(err.constraint(), Some("uq_series_profile_slug"));
    }

    #[tokio::test]
    async fn test_history_requires_parent() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work().unwrap();
        let err = uow
            .series_profile_history()
            .append(&history(Uuid::now_v7(), 1))
            .await
            .unwrap_err();
        assert_eq!(err.constraint(), Some("fk_series_profile_history_parent"));
    }

    #[tokio::test]
    async fn test_racing_units_of_work_collide_on_revision() {
        let store = MemoryStore::new();
        let p = profile("daily");
        let mut setup = store.unit_of_work().unwrap();
        setup.series_profiles().add(&p).await.unwrap();
        setup.series_profile_history().append(&history(p.id, 1)).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.unit_of_work().unwrap();
        let mut second = store.unit_of_work().unwrap();
        first.series_profile_history().append(&history(p.id, 2)).await.unwrap();
        second.series_profile_history().append(&history(p.id, 2)).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert_eq!(err.constraint(), Some("uq_series_profile_history_revision"));
        assert!(err.to_string().contains("(series_profile_id, revision)"));
        assert_eq!(store.counts().unwrap().series_profile_history, 2);
    }

    #[tokio::test]
    async fn test_latest_revisions_for_many_parents() {
        let store = MemoryStore::new();
        let a = profile("a");
        let b = profile("b");
        let c = profile("c");
        let mut uow = store.unit_of_work().unwrap();
        for p in [&a, &b, &c] {
            uow.series_profiles().add(p).await.unwrap();
        }
        for rev in 1..=3 {
            uow.series_profile_history().append(&history(a.id, rev)).await.unwrap();
        }
        uow.series_profile_history().append(&history(b.id, 1)).await.unwrap();

        let latest = uow
            .series_profile_history()
            .get_latest_revisions_for(&[a.id, b.id, c.id])
            .await
            .unwrap();
        assert_eq!(latest.get(&a.id), Some(&3));
        assert_eq!(latest.get(&b.id), Some(&1));
        assert!(!latest.contains_key(&c.id));
    }

    #[tokio::test]
    async fn test_finished_unit_of_work_rejects_use() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work().unwrap();
        uow.commit().await.unwrap();
        assert!(uow.series_profiles().get(Uuid::nil()).await.is_err());
        assert!(uow.commit().await.is_err());
        uow.rollback().await.unwrap();
    }
}
