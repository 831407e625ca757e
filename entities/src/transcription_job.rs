//! Transcription job (spec §3 "Transcription job"): resumable, one row per book.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transcription_job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    /// "queued" | "running" | "done" | "failed_retry_later"
    pub state: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub last_attempt: Option<DateTimeUtc>,
    /// Per-chunk completion flags, serialized as a JSON array of bools.
    pub chunk_done: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mapping::Entity",
        from = "Column::BookId",
        to = "super::mapping::Column::BookId"
    )]
    Mapping,
}

impl Related<super::mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mapping.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Done,
    FailedRetryLater,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::FailedRetryLater => "failed_retry_later",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "done" => JobState::Done,
            "failed_retry_later" => JobState::FailedRetryLater,
            _ => return None,
        })
    }
}
