//! Episode template create, update and reads.
//!
//! A template always belongs to one series profile. Its slug is unique
//! within that profile only.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use canon_core::{
    new_v7, AuditInfo, EntityKind, EpisodeTemplate, Error, HistoryEntry, Result, UnitOfWork,
};

use crate::engine;
use crate::profiles::{empty_object, require_non_empty};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeTemplateData {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub structure: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeTemplateUpdate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub structure: JsonValue,
}

#[derive(Debug, Clone)]
pub struct UpdateEpisodeTemplateRequest {
    pub template_id: Uuid,
    pub expected_revision: i32,
    pub data: EpisodeTemplateUpdate,
    pub audit: AuditInfo,
}

/// Create a template under `series_profile_id` at revision 1.
///
/// Fails with [`Error::EntityNotFound`] naming the profile when it does not
/// exist; the unit of work is rolled back.
pub async fn create_episode_template(
    uow: &mut dyn UnitOfWork,
    series_profile_id: Uuid,
    data: EpisodeTemplateData,
    audit: &AuditInfo,
) -> Result<(EpisodeTemplate, i32)> {
    require_non_empty("slug", &data.slug)?;
    require_non_empty("title", &data.title)?;

    let parent = match uow.series_profiles().get(series_profile_id).await {
        Ok(parent) => parent,
        Err(e) => {
            uow.rollback().await?;
            return Err(e);
        }
    };
    if parent.is_none() {
        debug!(
            subsystem = "catalog",
            component = "templates",
            op = "create",
            entity_id = %series_profile_id,
            "Parent series profile missing"
        );
        uow.rollback().await?;
        return Err(Error::EntityNotFound {
            kind: EntityKind::SeriesProfile.label(),
            id: series_profile_id,
        });
    }

    let now = Utc::now();
    let template = EpisodeTemplate {
        id: new_v7(),
        series_profile_id,
        slug: data.slug,
        title: data.title,
        description: data.description,
        structure: data.structure,
        created_at: now,
        updated_at: now,
    };
    engine::create_versioned(uow, template, audit).await
}

/// Replace a template's fields if `expected_revision` is still current.
pub async fn update_episode_template(
    uow: &mut dyn UnitOfWork,
    request: UpdateEpisodeTemplateRequest,
) -> Result<(EpisodeTemplate, i32)> {
    require_non_empty("title", &request.data.title)?;

    let EpisodeTemplateUpdate {
        title,
        description,
        structure,
    } = request.data;
    engine::update_versioned::<EpisodeTemplate, _>(
        uow,
        request.template_id,
        request.expected_revision,
        &request.audit,
        move |template| {
            template.title = title;
            template.description = description;
            template.structure = structure;
        },
    )
    .await
}

pub async fn get_episode_template(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<(EpisodeTemplate, i32)> {
    engine::get_with_revision(uow, id).await
}

/// Templates with their latest revisions, optionally scoped to one profile.
pub async fn list_episode_templates(
    uow: &mut dyn UnitOfWork,
    series_profile_id: Option<Uuid>,
) -> Result<Vec<(EpisodeTemplate, i32)>> {
    engine::list_with_revisions(uow, series_profile_id).await
}

pub async fn list_episode_template_history(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    engine::history_of::<EpisodeTemplate>(uow, id).await
}
