//! # canon-catalog
//!
//! Versioned series configuration for canon.
//!
//! Series profiles and episode templates are edited under optimistic
//! locking: every write appends a history row with the next revision, and
//! an update must name the revision it was based on. This crate provides:
//! - The generic create/update engine shared by every versioned kind
//! - Typed services for profiles and templates
//! - Reads selected by [`canon_core::EntityKind`] at runtime
//! - Structured series briefs and their prompt rendering
//!
//! ## Example
//!
//! ```ignore
//! use canon_catalog::{update_series_profile, UpdateSeriesProfileRequest};
//!
//! let mut uow = db.unit_of_work();
//! let (profile, revision) = update_series_profile(&mut uow, request).await?;
//! ```

pub mod brief;
pub mod dispatch;
pub mod engine;
pub mod profiles;
pub mod templates;

pub use brief::{
    build_series_brief, render_series_brief_prompt, BriefEpisodeTemplate, BriefSeriesProfile,
    SeriesBrief,
};
pub use dispatch::{
    dispatch_for, get_entity_with_revision, list_entities_with_revisions, list_history,
    CatalogEntity, CatalogKind, KindDispatch,
};
pub use engine::{create_versioned, is_revision_collision, update_versioned};
pub use profiles::{
    create_series_profile, get_series_profile, list_series_profile_history, list_series_profiles,
    update_series_profile, SeriesProfileData, SeriesProfileUpdate, UpdateSeriesProfileRequest,
};
pub use templates::{
    create_episode_template, get_episode_template, list_episode_template_history,
    list_episode_templates, update_episode_template, EpisodeTemplateData, EpisodeTemplateUpdate,
    UpdateEpisodeTemplateRequest,
};
