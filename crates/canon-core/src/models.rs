//! Core data models for canon.
//!
//! These types are shared across all canon crates and represent the
//! persisted domain entities plus the inputs used to create them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Editorial lifecycle of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Draft,
    InProgress,
    QualityReview,
    EditorialReview,
    OnHold,
    Rejected,
    AudioGeneration,
    PostProcessing,
    ReadyToPublish,
    Scheduled,
    Published,
    Updated,
    Failed,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::InProgress => "in_progress",
            RecordStatus::QualityReview => "quality_review",
            RecordStatus::EditorialReview => "editorial_review",
            RecordStatus::OnHold => "on_hold",
            RecordStatus::Rejected => "rejected",
            RecordStatus::AudioGeneration => "audio_generation",
            RecordStatus::PostProcessing => "post_processing",
            RecordStatus::ReadyToPublish => "ready_to_publish",
            RecordStatus::Scheduled => "scheduled",
            RecordStatus::Published => "published",
            RecordStatus::Updated => "updated",
            RecordStatus::Failed => "failed",
            RecordStatus::Archived => "archived",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "draft" => RecordStatus::Draft,
            "in_progress" => RecordStatus::InProgress,
            "quality_review" => RecordStatus::QualityReview,
            "editorial_review" => RecordStatus::EditorialReview,
            "on_hold" => RecordStatus::OnHold,
            "rejected" => RecordStatus::Rejected,
            "audio_generation" => RecordStatus::AudioGeneration,
            "post_processing" => RecordStatus::PostProcessing,
            "ready_to_publish" => RecordStatus::ReadyToPublish,
            "scheduled" => RecordStatus::Scheduled,
            "published" => RecordStatus::Published,
            "updated" => RecordStatus::Updated,
            "failed" => RecordStatus::Failed,
            "archived" => RecordStatus::Archived,
            other => {
                return Err(Error::Serialization(format!(
                    "unknown record status '{}'",
                    other
                )))
            }
        })
    }
}

/// Approval workflow state of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Draft => "draft",
            ApprovalState::Submitted => "submitted",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        }
    }
}

impl FromStr for ApprovalState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "draft" => ApprovalState::Draft,
            "submitted" => ApprovalState::Submitted,
            "approved" => ApprovalState::Approved,
            "rejected" => ApprovalState::Rejected,
            other => {
                return Err(Error::Serialization(format!(
                    "unknown approval state '{}'",
                    other
                )))
            }
        })
    }
}

/// Status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Running => "running",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Failed => "failed",
        }
    }
}

impl FromStr for IngestionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => IngestionStatus::Pending,
            "running" => IngestionStatus::Running,
            "completed" => IngestionStatus::Completed,
            "failed" => IngestionStatus::Failed,
            other => {
                return Err(Error::Serialization(format!(
                    "unknown ingestion status '{}'",
                    other
                )))
            }
        })
    }
}

// =============================================================================
// VERSIONED ENTITIES
// =============================================================================

/// Kinds of entity guarded by optimistic locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    SeriesProfile,
    EpisodeTemplate,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::SeriesProfile, EntityKind::EpisodeTemplate];

    /// Human-readable label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::SeriesProfile => "Series profile",
            EntityKind::EpisodeTemplate => "Episode template",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::SeriesProfile => "series_profile",
            EntityKind::EpisodeTemplate => "episode_template",
        }
    }

    pub fn history_table(&self) -> &'static str {
        match self {
            EntityKind::SeriesProfile => "series_profile_history",
            EntityKind::EpisodeTemplate => "episode_template_history",
        }
    }

    /// Column in the history table referencing the parent entity.
    pub fn parent_column(&self) -> &'static str {
        match self {
            EntityKind::SeriesProfile => "series_profile_id",
            EntityKind::EpisodeTemplate => "episode_template_id",
        }
    }

    /// Name of the `(parent, revision)` unique constraint.
    pub fn revision_constraint(&self) -> &'static str {
        match self {
            EntityKind::SeriesProfile => "uq_series_profile_history_revision",
            EntityKind::EpisodeTemplate => "uq_episode_template_history_revision",
        }
    }
}

/// A named series configuration. `configuration.weighting` feeds source weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesProfile {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub configuration: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Episode structure owned by a series profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeTemplate {
    pub id: Uuid,
    pub series_profile_id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub structure: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only snapshot of a versioned entity at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub revision: i32,
    pub actor: Option<String>,
    pub note: Option<String>,
    pub snapshot: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Who made a change and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub actor: Option<String>,
    pub note: Option<String>,
}

impl AuditInfo {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// INGESTION ENTITIES
// =============================================================================

/// Parsed document header plus the raw document it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub id: Uuid,
    pub title: String,
    pub payload: JsonValue,
    pub raw_document: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single authoritative content item produced by an ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: Uuid,
    pub series_profile_id: Uuid,
    pub header_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: RecordStatus,
    pub approval_state: ApprovalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub series_profile_id: Uuid,
    pub target_record_id: Option<Uuid>,
    pub status: IngestionStatus,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ingested source, immutable once written. `weight` is within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub ingestion_job_id: Uuid,
    pub canonical_record_id: Option<Uuid>,
    pub source_type: String,
    pub source_uri: String,
    pub weight: f64,
    pub content_hash: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub id: Uuid,
    pub canonical_record_id: Uuid,
    pub actor: Option<String>,
    pub from_state: Option<ApprovalState>,
    pub to_state: ApprovalState,
    pub note: Option<String>,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Persistence-shaped description of a source before it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocumentInput {
    pub source_type: String,
    pub source_uri: String,
    pub weight: f64,
    pub content_hash: String,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

/// Input to single-record ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRequest {
    /// Canonical document text; must carry a parseable header.
    pub document: String,
    pub sources: Vec<SourceDocumentInput>,
    pub requested_by: Option<String>,
}
