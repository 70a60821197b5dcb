//! Optimistic-lock engine for versioned entities.
//!
//! Every entity kind shares one algorithm. An update names the revision the
//! caller last saw; it is rejected as stale when that is no longer the latest
//! revision, and rejected as concurrent when another writer commits the same
//! next revision first. The second case is detected by the database's unique
//! `(parent, revision)` constraint, never by in-process locking.
//!
//! Functions here take an open unit of work and finish it: writes commit on
//! success and roll back on failure.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use canon_core::{
    new_v7, AuditInfo, ConflictDetail, EntityKind, Error, HistoryEntry, Result, UnitOfWork,
    VersionedEntity,
};

/// Whether `err` is a unique violation on `kind`'s `(parent, revision)` pair.
///
/// Matches on the reported constraint name, falling back to the constraint
/// name or column pair appearing in the driver message.
pub fn is_revision_collision(err: &Error, kind: EntityKind) -> bool {
    let Error::Integrity {
        constraint,
        message,
    } = err
    else {
        return false;
    };

    let revision_constraint = kind.revision_constraint();
    if constraint.as_deref() == Some(revision_constraint) {
        return true;
    }
    let column_pair = format!("{}, revision", kind.parent_column());
    message.contains(revision_constraint) || message.contains(&column_pair)
}

/// Latest stored revision for `id`, or 0 when it has no history.
pub async fn latest_revision<E: VersionedEntity>(uow: &mut dyn UnitOfWork, id: Uuid) -> Result<i32> {
    Ok(E::history(uow)
        .get_latest_for(id)
        .await?
        .map(|entry| entry.revision)
        .unwrap_or(0))
}

/// Fetch an entity with its latest revision.
pub async fn get_with_revision<E: VersionedEntity>(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<(E, i32)> {
    let entity = E::repository(uow)
        .get(id)
        .await?
        .ok_or(Error::EntityNotFound {
            kind: E::KIND.label(),
            id,
        })?;
    let revision = latest_revision::<E>(uow, id).await?;
    Ok((entity, revision))
}

/// List entities paired with their latest revisions in one bulk lookup.
pub async fn list_with_revisions<E: VersionedEntity>(
    uow: &mut dyn UnitOfWork,
    parent: Option<Uuid>,
) -> Result<Vec<(E, i32)>> {
    let entities = E::repository(uow).list(parent).await?;
    let ids: Vec<Uuid> = entities.iter().map(VersionedEntity::id).collect();
    let revisions: HashMap<Uuid, i32> = E::history(uow).get_latest_revisions_for(&ids).await?;

    Ok(entities
        .into_iter()
        .map(|entity| {
            let revision = revisions.get(&entity.id()).copied().unwrap_or(0);
            (entity, revision)
        })
        .collect())
}

/// History entries for `id`, ascending by revision.
pub async fn history_of<E: VersionedEntity>(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    E::history(uow).list_for(id).await
}

fn history_entry<E: VersionedEntity>(
    entity: &E,
    revision: i32,
    audit: &AuditInfo,
    at: DateTime<Utc>,
) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: new_v7(),
        parent_id: entity.id(),
        revision,
        actor: audit.actor.clone(),
        note: audit.note.clone(),
        snapshot: entity.snapshot()?,
        created_at: at,
    })
}

/// Roll back and hand `err` back, logging a failed rollback.
async fn abort<T>(uow: &mut dyn UnitOfWork, err: Error) -> Result<T> {
    if let Err(rollback_err) = uow.rollback().await {
        warn!(
            subsystem = "catalog",
            component = "engine",
            op = "rollback",
            error = %rollback_err,
            "Rollback failed"
        );
    }
    Err(err)
}

/// Persist a new entity with history revision 1.
pub async fn create_versioned<E: VersionedEntity>(
    uow: &mut dyn UnitOfWork,
    entity: E,
    audit: &AuditInfo,
) -> Result<(E, i32)> {
    let entry = history_entry(&entity, 1, audit, Utc::now())?;

    let written = async {
        E::repository(uow).add(&entity).await?;
        uow.flush().await?;
        E::history(uow).append(&entry).await?;
        uow.commit().await
    }
    .await;
    if let Err(e) = written {
        return abort(uow, e).await;
    }

    info!(
        subsystem = "catalog",
        component = "engine",
        op = "create",
        entity_kind = E::KIND.table(),
        entity_id = %entity.id(),
        revision = 1,
        "Created versioned entity"
    );
    Ok((entity, 1))
}

/// Apply `change` to entity `id` if `expected_revision` is still current.
///
/// Returns the updated entity and its new revision. Fails with
/// [`Error::RevisionConflict`] when the expectation is stale or when a
/// concurrent writer wins the race; nothing is written in either case.
pub async fn update_versioned<E, F>(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    expected_revision: i32,
    audit: &AuditInfo,
    change: F,
) -> Result<(E, i32)>
where
    E: VersionedEntity,
    F: FnOnce(&mut E) + Send,
{
    let (mut entity, latest) = match get_with_revision::<E>(uow, id).await {
        Ok(found) => found,
        Err(e) => return abort(uow, e).await,
    };

    if expected_revision != latest {
        debug!(
            subsystem = "catalog",
            component = "engine",
            op = "update",
            entity_kind = E::KIND.table(),
            entity_id = %id,
            expected_revision,
            revision = latest,
            "Rejected stale update"
        );
        let stale = Error::RevisionConflict {
            kind: E::KIND.label(),
            id,
            detail: ConflictDetail::Stale {
                expected: expected_revision,
                actual: latest,
            },
        };
        return abort(uow, stale).await;
    }

    let now = Utc::now();
    change(&mut entity);
    entity.set_updated_at(now);
    let next = latest + 1;
    let entry = match history_entry(&entity, next, audit, now) {
        Ok(entry) => entry,
        Err(e) => return abort(uow, e).await,
    };

    let written = async {
        E::repository(uow).update(&entity).await?;
        E::history(uow).append(&entry).await?;
        uow.commit().await
    }
    .await;

    match written {
        Ok(()) => {
            info!(
                subsystem = "catalog",
                component = "engine",
                op = "update",
                entity_kind = E::KIND.table(),
                entity_id = %id,
                revision = next,
                "Updated versioned entity"
            );
            Ok((entity, next))
        }
        Err(e) if is_revision_collision(&e, E::KIND) => {
            warn!(
                subsystem = "catalog",
                component = "engine",
                op = "update",
                entity_kind = E::KIND.table(),
                entity_id = %id,
                revision = next,
                constraint = e.constraint().unwrap_or(""),
                "Concurrent update detected"
            );
            let concurrent = Error::RevisionConflict {
                kind: E::KIND.label(),
                id,
                detail: ConflictDetail::Concurrent,
            };
            abort(uow, concurrent).await
        }
        Err(e) => abort(uow, e).await,
    }
}
