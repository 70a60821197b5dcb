//! Persistence port consumed by ingestion and the versioned catalog.
//!
//! A [`UnitOfWork`] is one transaction. Every repository accessor borrows the
//! same transaction, so writes made through different repositories commit or
//! roll back together. Dropping a unit of work without calling
//! [`UnitOfWork::commit`] discards everything written through it.
//!
//! Adapters live in `canon-db`: `PgUnitOfWork` for PostgreSQL and
//! `MemoryUnitOfWork` for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Insert and point lookup.
#[async_trait]
pub trait Repository<T: Send + Sync + 'static>: Send {
    async fn add(&mut self, item: &T) -> Result<()>;

    async fn get(&mut self, id: Uuid) -> Result<Option<T>>;
}

/// Repository for mutable, slug-addressed entities.
#[async_trait]
pub trait EntityRepository<T: Send + Sync + 'static>: Repository<T> {
    /// Overwrite the stored row. Fails with `EntityNotFound` when absent.
    async fn update(&mut self, item: &T) -> Result<()>;

    /// List entities, optionally restricted to one owning parent.
    ///
    /// Parentless kinds ignore the filter.
    async fn list(&mut self, parent: Option<Uuid>) -> Result<Vec<T>>;

    /// Find by slug within an optional owning parent.
    async fn get_by_slug(&mut self, slug: &str, parent: Option<Uuid>) -> Result<Option<T>>;
}

/// Repository for rows that hang off a parent (sources by job, events by record).
#[async_trait]
pub trait ChildRepository<T: Send + Sync + 'static>: Repository<T> {
    /// All children of `parent_id` in insertion order.
    async fn list_for(&mut self, parent_id: Uuid) -> Result<Vec<T>>;
}

/// Append-only revision history for one entity kind.
#[async_trait]
pub trait HistoryRepository<E: Send + Sync + 'static>: Send {
    async fn append(&mut self, entry: &HistoryEntry) -> Result<()>;

    /// Entry with the highest revision for `parent_id`.
    async fn get_latest_for(&mut self, parent_id: Uuid) -> Result<Option<HistoryEntry>>;

    /// All entries for `parent_id`, ascending by revision.
    async fn list_for(&mut self, parent_id: Uuid) -> Result<Vec<HistoryEntry>>;

    /// Latest revision per parent. Parents without history are absent from the map.
    async fn get_latest_revisions_for(&mut self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>>;
}

// =============================================================================
// UNIT OF WORK
// =============================================================================

/// One transactional scope over every repository.
#[async_trait]
pub trait UnitOfWork: Send {
    fn series_profiles(&mut self) -> &mut dyn EntityRepository<SeriesProfile>;
    fn series_profile_history(&mut self) -> &mut dyn HistoryRepository<SeriesProfile>;
    fn episode_templates(&mut self) -> &mut dyn EntityRepository<EpisodeTemplate>;
    fn episode_template_history(&mut self) -> &mut dyn HistoryRepository<EpisodeTemplate>;
    fn headers(&mut self) -> &mut dyn Repository<DocumentHeader>;
    fn records(&mut self) -> &mut dyn Repository<CanonicalRecord>;
    fn ingestion_jobs(&mut self) -> &mut dyn Repository<IngestionJob>;
    fn source_documents(&mut self) -> &mut dyn ChildRepository<SourceDocument>;
    fn approval_events(&mut self) -> &mut dyn ChildRepository<ApprovalEvent>;

    /// Push pending writes to the backend without ending the transaction.
    async fn flush(&mut self) -> Result<()>;

    /// Make every write visible. The unit of work is finished afterwards.
    async fn commit(&mut self) -> Result<()>;

    /// Discard every write. Safe to call on a finished unit of work.
    async fn rollback(&mut self) -> Result<()>;
}

/// Opens units of work.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

// =============================================================================
// VERSIONED ENTITIES
// =============================================================================

/// An entity with an identity and a revision history.
///
/// Binds an entity type to its repository pair so the update engine can be
/// written once for every kind.
pub trait VersionedEntity: Serialize + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Immutable JSON image stored with each history entry.
    fn snapshot(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn EntityRepository<Self>;

    fn history(uow: &mut dyn UnitOfWork) -> &mut dyn HistoryRepository<Self>;
}

impl VersionedEntity for SeriesProfile {
    const KIND: EntityKind = EntityKind::SeriesProfile;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn EntityRepository<Self> {
        uow.series_profiles()
    }

    fn history(uow: &mut dyn UnitOfWork) -> &mut dyn HistoryRepository<Self> {
        uow.series_profile_history()
    }
}

impl VersionedEntity for EpisodeTemplate {
    const KIND: EntityKind = EntityKind::EpisodeTemplate;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn EntityRepository<Self> {
        uow.episode_templates()
    }

    fn history(uow: &mut dyn UnitOfWork) -> &mut dyn HistoryRepository<Self> {
        uow.episode_template_history()
    }
}
