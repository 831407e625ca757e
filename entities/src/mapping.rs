//! Book mapping: the unit of synchronization (spec §3 "Book mapping").

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mapping")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    /// "audiobook" | "ebook_only"
    pub sync_mode: String,
    /// "pending" | "processing" | "active" | "failed_retry_later" | "disabled"
    pub status: String,
    pub duration_seconds: Option<f64>,
    /// Path/id of the alignment artifact on disk, once transcription completes.
    pub alignment_ref: Option<String>,
    pub consecutive_failures: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client_state::Entity")]
    ClientState,
    #[sea_orm(has_many = "super::alignment_anchor::Entity")]
    AlignmentAnchor,
    #[sea_orm(has_one = "super::transcription_job::Entity")]
    TranscriptionJob,
    #[sea_orm(has_many = "super::external_identifier::Entity")]
    ExternalIdentifier,
}

impl Related<super::client_state::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientState.def()
    }
}

impl Related<super::alignment_anchor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlignmentAnchor.def()
    }
}

impl Related<super::transcription_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TranscriptionJob.def()
    }
}

impl Related<super::external_identifier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExternalIdentifier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Closed set of lifecycle states (spec §4.8 "State machine per book").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Processing,
    Active,
    FailedRetryLater,
    Disabled,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Active => "active",
            Status::FailedRetryLater => "failed_retry_later",
            Status::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Status::Pending,
            "processing" => Status::Processing,
            "active" => Status::Active,
            "failed_retry_later" => Status::FailedRetryLater,
            "disabled" => Status::Disabled,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Audiobook,
    EbookOnly,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Audiobook => "audiobook",
            SyncMode::EbookOnly => "ebook_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "audiobook" => SyncMode::Audiobook,
            "ebook_only" => SyncMode::EbookOnly,
            _ => return None,
        })
    }
}
