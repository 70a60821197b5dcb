//! Reads selected by [`EntityKind`] at runtime.
//!
//! Each kind has one static [`KindDispatch`] row binding the generic engine
//! reads to that kind's concrete type. Callers that only know the kind (an
//! API route parameter, say) go through [`dispatch_for`].

use futures::future::BoxFuture;
use serde::Serialize;
use uuid::Uuid;

use canon_core::{EntityKind, EpisodeTemplate, HistoryEntry, Result, SeriesProfile, UnitOfWork, VersionedEntity};

use crate::engine;

/// An entity of any versioned kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum CatalogEntity {
    SeriesProfile(SeriesProfile),
    EpisodeTemplate(EpisodeTemplate),
}

impl CatalogEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogEntity::SeriesProfile(_) => EntityKind::SeriesProfile,
            CatalogEntity::EpisodeTemplate(_) => EntityKind::EpisodeTemplate,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CatalogEntity::SeriesProfile(p) => p.id,
            CatalogEntity::EpisodeTemplate(t) => t.id,
        }
    }

    pub fn into_series_profile(self) -> Option<SeriesProfile> {
        match self {
            CatalogEntity::SeriesProfile(p) => Some(p),
            CatalogEntity::EpisodeTemplate(_) => None,
        }
    }

    pub fn into_episode_template(self) -> Option<EpisodeTemplate> {
        match self {
            CatalogEntity::EpisodeTemplate(t) => Some(t),
            CatalogEntity::SeriesProfile(_) => None,
        }
    }
}

/// Versioned kinds that can be carried in a [`CatalogEntity`].
pub trait CatalogKind: VersionedEntity {
    fn wrap(self) -> CatalogEntity;
}

impl CatalogKind for SeriesProfile {
    fn wrap(self) -> CatalogEntity {
        CatalogEntity::SeriesProfile(self)
    }
}

impl CatalogKind for EpisodeTemplate {
    fn wrap(self) -> CatalogEntity {
        CatalogEntity::EpisodeTemplate(self)
    }
}

pub type GetWithRevisionFn =
    for<'a> fn(&'a mut dyn UnitOfWork, Uuid) -> BoxFuture<'a, Result<(CatalogEntity, i32)>>;
pub type ListHistoryFn =
    for<'a> fn(&'a mut dyn UnitOfWork, Uuid) -> BoxFuture<'a, Result<Vec<HistoryEntry>>>;
pub type ListWithRevisionsFn =
    for<'a> fn(&'a mut dyn UnitOfWork, Option<Uuid>) -> BoxFuture<'a, Result<Vec<(CatalogEntity, i32)>>>;

/// Engine reads bound to one entity kind.
pub struct KindDispatch {
    pub kind: EntityKind,
    pub get_with_revision: GetWithRevisionFn,
    pub list_history: ListHistoryFn,
    pub list_with_revisions: ListWithRevisionsFn,
}

fn get_boxed<E: CatalogKind>(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> BoxFuture<'_, Result<(CatalogEntity, i32)>> {
    Box::pin(async move {
        let (entity, revision) = engine::get_with_revision::<E>(uow, id).await?;
        Ok((entity.wrap(), revision))
    })
}

fn history_boxed<E: CatalogKind>(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> BoxFuture<'_, Result<Vec<HistoryEntry>>> {
    Box::pin(engine::history_of::<E>(uow, id))
}

fn list_boxed<E: CatalogKind>(
    uow: &mut dyn UnitOfWork,
    parent: Option<Uuid>,
) -> BoxFuture<'_, Result<Vec<(CatalogEntity, i32)>>> {
    Box::pin(async move {
        let items = engine::list_with_revisions::<E>(uow, parent).await?;
        Ok(items.into_iter().map(|(e, rev)| (e.wrap(), rev)).collect())
    })
}

static SERIES_PROFILE: KindDispatch = KindDispatch {
    kind: EntityKind::SeriesProfile,
    get_with_revision: get_boxed::<SeriesProfile>,
    list_history: history_boxed::<SeriesProfile>,
    list_with_revisions: list_boxed::<SeriesProfile>,
};

static EPISODE_TEMPLATE: KindDispatch = KindDispatch {
    kind: EntityKind::EpisodeTemplate,
    get_with_revision: get_boxed::<EpisodeTemplate>,
    list_history: history_boxed::<EpisodeTemplate>,
    list_with_revisions: list_boxed::<EpisodeTemplate>,
};

/// The dispatch row for `kind`.
pub fn dispatch_for(kind: EntityKind) -> &'static KindDispatch {
    match kind {
        EntityKind::SeriesProfile => &SERIES_PROFILE,
        EntityKind::EpisodeTemplate => &EPISODE_TEMPLATE,
    }
}

/// Fetch one entity of `kind` with its latest revision.
pub async fn get_entity_with_revision(
    uow: &mut dyn UnitOfWork,
    kind: EntityKind,
    id: Uuid,
) -> Result<(CatalogEntity, i32)> {
    (dispatch_for(kind).get_with_revision)(uow, id).await
}

/// History of one entity of `kind`, ascending by revision.
pub async fn list_history(
    uow: &mut dyn UnitOfWork,
    kind: EntityKind,
    parent_id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    (dispatch_for(kind).list_history)(uow, parent_id).await
}

/// Every entity of `kind` with its latest revision.
///
/// `series_profile_id` narrows episode templates to one profile and is
/// ignored for series profiles.
pub async fn list_entities_with_revisions(
    uow: &mut dyn UnitOfWork,
    kind: EntityKind,
    series_profile_id: Option<Uuid>,
) -> Result<Vec<(CatalogEntity, i32)>> {
    (dispatch_for(kind).list_with_revisions)(uow, series_profile_id).await
}
