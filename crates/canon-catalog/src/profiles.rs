//! Series profile create, update and reads.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use canon_core::{new_v7, AuditInfo, Error, HistoryEntry, Result, SeriesProfile, UnitOfWork};

use crate::engine;

/// Fields for a new series profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesProfileData {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub configuration: JsonValue,
}

/// Replacement fields for an existing series profile. The slug is fixed at
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesProfileUpdate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub configuration: JsonValue,
}

#[derive(Debug, Clone)]
pub struct UpdateSeriesProfileRequest {
    pub profile_id: Uuid,
    pub expected_revision: i32,
    pub data: SeriesProfileUpdate,
    pub audit: AuditInfo,
}

pub(crate) fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Create a series profile at revision 1.
pub async fn create_series_profile(
    uow: &mut dyn UnitOfWork,
    data: SeriesProfileData,
    audit: &AuditInfo,
) -> Result<(SeriesProfile, i32)> {
    require_non_empty("slug", &data.slug)?;
    require_non_empty("title", &data.title)?;

    let now = Utc::now();
    let profile = SeriesProfile {
        id: new_v7(),
        slug: data.slug,
        title: data.title,
        description: data.description,
        configuration: data.configuration,
        created_at: now,
        updated_at: now,
    };
    engine::create_versioned(uow, profile, audit).await
}

/// Replace a profile's fields if `expected_revision` is still current.
pub async fn update_series_profile(
    uow: &mut dyn UnitOfWork,
    request: UpdateSeriesProfileRequest,
) -> Result<(SeriesProfile, i32)> {
    require_non_empty("title", &request.data.title)?;

    let SeriesProfileUpdate {
        title,
        description,
        configuration,
    } = request.data;
    engine::update_versioned::<SeriesProfile, _>(
        uow,
        request.profile_id,
        request.expected_revision,
        &request.audit,
        move |profile| {
            profile.title = title;
            profile.description = description;
            profile.configuration = configuration;
        },
    )
    .await
}

pub async fn get_series_profile(uow: &mut dyn UnitOfWork, id: Uuid) -> Result<(SeriesProfile, i32)> {
    engine::get_with_revision(uow, id).await
}

pub async fn list_series_profiles(uow: &mut dyn UnitOfWork) -> Result<Vec<(SeriesProfile, i32)>> {
    engine::list_with_revisions(uow, None).await
}

pub async fn list_series_profile_history(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<Vec<HistoryEntry>> {
    engine::history_of::<SeriesProfile>(uow, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_defaults_configuration_to_empty_object() {
        let data: SeriesProfileData =
            serde_json::from_value(json!({"slug": "s", "title": "T"})).unwrap();
        assert_eq!(data.configuration, json!({}));
        assert!(data.description.is_none());
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(require_non_empty("slug", "  ").unwrap_err().is_validation());
        assert!(require_non_empty("slug", "ok").is_ok());
    }
}
