//! Structured series briefs.
//!
//! A brief is what downstream generation consumes: one series profile and
//! its episode templates, each stamped with its latest revision so the
//! consumer can tell which configuration it was built from.
//! [`render_series_brief_prompt`] turns a brief into the fixed prompt
//! scaffold handed to a generator.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use canon_core::{EntityKind, EpisodeTemplate, Error, Result, SeriesProfile, UnitOfWork};

use crate::engine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefSeriesProfile {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub configuration: JsonValue,
    pub revision: i32,
    /// RFC 3339.
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefEpisodeTemplate {
    pub id: Uuid,
    pub series_profile_id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub structure: JsonValue,
    pub revision: i32,
    /// RFC 3339.
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBrief {
    pub series_profile: BriefSeriesProfile,
    pub episode_templates: Vec<BriefEpisodeTemplate>,
}

impl SeriesBrief {
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

impl BriefSeriesProfile {
    fn new(profile: SeriesProfile, revision: i32) -> Self {
        Self {
            id: profile.id,
            updated_at: profile.updated_at.to_rfc3339(),
            slug: profile.slug,
            title: profile.title,
            description: profile.description,
            configuration: profile.configuration,
            revision,
        }
    }
}

impl BriefEpisodeTemplate {
    fn new(template: EpisodeTemplate, revision: i32) -> Self {
        Self {
            id: template.id,
            series_profile_id: template.series_profile_id,
            updated_at: template.updated_at.to_rfc3339(),
            slug: template.slug,
            title: template.title,
            description: template.description,
            structure: template.structure,
            revision,
        }
    }
}

/// Build the brief for `profile_id`.
///
/// With `template_id` the brief carries only that template, which must
/// belong to the profile; otherwise it carries every template of the
/// profile.
pub async fn build_series_brief(
    uow: &mut dyn UnitOfWork,
    profile_id: Uuid,
    template_id: Option<Uuid>,
) -> Result<SeriesBrief> {
    let (profile, profile_revision) = engine::get_with_revision::<SeriesProfile>(uow, profile_id).await?;

    let templates = match template_id {
        Some(id) => {
            let (template, revision) = engine::get_with_revision::<EpisodeTemplate>(uow, id).await?;
            if template.series_profile_id != profile.id {
                return Err(Error::EntityNotFound {
                    kind: EntityKind::EpisodeTemplate.label(),
                    id,
                });
            }
            vec![(template, revision)]
        }
        None => engine::list_with_revisions::<EpisodeTemplate>(uow, Some(profile.id)).await?,
    };

    Ok(SeriesBrief {
        series_profile: BriefSeriesProfile::new(profile, profile_revision),
        episode_templates: templates
            .into_iter()
            .map(|(template, revision)| BriefEpisodeTemplate::new(template, revision))
            .collect(),
    })
}

/// Canonical JSON text: object keys sorted at every depth.
fn sorted_json(value: &JsonValue) -> String {
    fn sort(value: &JsonValue) -> JsonValue {
        match value {
            JsonValue::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = serde_json::Map::new();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                JsonValue::Object(sorted)
            }
            JsonValue::Array(items) => JsonValue::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Render the generation prompt scaffold for `brief`.
///
/// Sections always appear in the same order and JSON is emitted with sorted
/// keys, so equal briefs render to identical text. A missing description
/// renders as an empty string.
pub fn render_series_brief_prompt(brief: &SeriesBrief) -> Result<String> {
    let profile = &brief.series_profile;
    let templates = serde_json::to_value(&brief.episode_templates)?;

    Ok(format!(
        "Series slug: {}\n\
         Series title: {}\n\
         Series description: {}\n\
         Series configuration JSON: {}\n\
         Template count: {}\n\
         Episode templates JSON: {}\n",
        profile.slug,
        profile.title,
        profile.description.as_deref().unwrap_or(""),
        sorted_json(&profile.configuration),
        brief.episode_templates.len(),
        sorted_json(&templates),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brief() -> SeriesBrief {
        let profile_id = Uuid::nil();
        SeriesBrief {
            series_profile: BriefSeriesProfile {
                id: profile_id,
                slug: "morning-brief".into(),
                title: "Morning Brief".into(),
                description: None,
                configuration: json!({"tone": "calm", "audience": {"region": "uk", "age": 30}}),
                revision: 2,
                updated_at: "2026-03-01T12:00:00+00:00".into(),
            },
            episode_templates: vec![BriefEpisodeTemplate {
                id: Uuid::from_u128(1),
                series_profile_id: profile_id,
                slug: "standard".into(),
                title: "Standard".into(),
                description: Some("Daily".into()),
                structure: json!({"segments": ["intro", "outro"]}),
                revision: 1,
                updated_at: "2026-03-01T12:00:00+00:00".into(),
            }],
        }
    }

    #[test]
    fn test_prompt_text_is_pinned() {
        let rendered = render_series_brief_prompt(&brief()).unwrap();
        let expected = concat!(
            "Series slug: morning-brief\n",
            "Series title: Morning Brief\n",
            "Series description: \n",
            "Series configuration JSON: {\"audience\":{\"age\":30,\"region\":\"uk\"},\"tone\":\"calm\"}\n",
            "Template count: 1\n",
            "Episode templates JSON: [{\"description\":\"Daily\",",
            "\"id\":\"00000000-0000-0000-0000-000000000001\",",
            "\"revision\":1,",
            "\"series_profile_id\":\"00000000-0000-0000-0000-000000000000\",",
            "\"slug\":\"standard\",",
            "\"structure\":{\"segments\":[\"intro\",\"outro\"]},",
            "\"title\":\"Standard\",",
            "\"updated_at\":\"2026-03-01T12:00:00+00:00\"}]\n",
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_empty_template_list() {
        let mut brief = brief();
        brief.episode_templates.clear();
        brief.series_profile.description = Some("Daily news".into());

        let rendered = render_series_brief_prompt(&brief).unwrap();
        assert!(rendered.contains("Series description: Daily news\n"));
        assert!(rendered.ends_with("Template count: 0\nEpisode templates JSON: []\n"));
    }

    #[test]
    fn test_brief_json_shape() {
        let value = brief().to_json().unwrap();
        assert_eq!(value["series_profile"]["revision"], 2);
        assert_eq!(value["episode_templates"][0]["slug"], "standard");
    }
}
