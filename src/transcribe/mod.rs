//! Transcription job manager (C9, spec §4.9): turns an audiobook into a
//! searchable transcript in resumable chunks, so the translator (C6) and the
//! ABS adapter's `text_at` have something to fuzzy-match against.

mod store;

pub use store::{TranscriptChunk, TranscriptStore};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};

/// One window of audio handed to a transcription backend at a time.
pub const DEFAULT_CHUNK_SECONDS: f64 = 600.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribedChunk {
    pub index: u32,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Pluggable speech-to-text backend. Production deployments wire a real
/// model; tests use a stub that fabricates deterministic text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe_chunk(
        &self,
        book_id: &str,
        audio_path: &str,
        chunk_index: u32,
        start_seconds: f64,
        end_seconds: f64,
    ) -> SyncResult<TranscribedChunk>;
}

/// Deterministic transcriber used when no real speech-to-text backend is
/// configured; keeps the pipeline exercisable without external services.
pub struct NullTranscriber;

#[async_trait]
impl Transcriber for NullTranscriber {
    async fn transcribe_chunk(
        &self,
        book_id: &str,
        _audio_path: &str,
        chunk_index: u32,
        start_seconds: f64,
        end_seconds: f64,
    ) -> SyncResult<TranscribedChunk> {
        Ok(TranscribedChunk {
            index: chunk_index,
            start_seconds,
            end_seconds,
            text: format!("[untranscribed chunk {chunk_index} of {book_id}]"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Done,
    FailedRetryLater,
}

impl JobState {
    fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::FailedRetryLater => "failed_retry_later",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "running" => JobState::Running,
            "done" => JobState::Done,
            "failed_retry_later" => JobState::FailedRetryLater,
            _ => JobState::Queued,
        }
    }
}

/// Drives one audiobook's transcription to completion across process
/// restarts: progress is persisted per-chunk so a crash mid-job resumes from
/// the last completed chunk rather than starting over (spec §4.9 "resumable
/// chunked jobs").
pub struct JobManager {
    db: Arc<DatabaseConnection>,
    transcripts: Arc<TranscriptStore>,
    transcriber: Arc<dyn Transcriber>,
    max_retries: u32,
    retry_delay_minutes: i64,
}

impl JobManager {
    pub fn new(
        db: Arc<DatabaseConnection>,
        transcripts: Arc<TranscriptStore>,
        transcriber: Arc<dyn Transcriber>,
        max_retries: u32,
        retry_delay_minutes: u64,
    ) -> Self {
        JobManager {
            db,
            transcripts,
            transcriber,
            max_retries,
            retry_delay_minutes: retry_delay_minutes as i64,
        }
    }

    pub fn transcripts(&self) -> &Arc<TranscriptStore> {
        &self.transcripts
    }

    /// Run (or resume) the transcription job for `book_id` against an audio
    /// file of `total_seconds` duration. Chunks already recorded as done are
    /// skipped.
    pub async fn run(
        &self,
        book_id: &str,
        audio_path: &str,
        total_seconds: f64,
    ) -> SyncResult<()> {
        let chunk_count = ((total_seconds / DEFAULT_CHUNK_SECONDS).ceil() as u32).max(1);
        let existing = entities::transcription_job::Entity::find_by_id(book_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;

        let mut done: Vec<u32> = existing
            .as_ref()
            .and_then(|m| serde_json::from_value(m.chunk_done.clone()).ok())
            .unwrap_or_default();

        if let Some(m) = &existing {
            if JobState::parse(&m.state) == JobState::Done {
                return Ok(());
            }
            if let Some(last_attempt) = m.last_attempt {
                let cooldown = chrono::Duration::minutes(self.retry_delay_minutes);
                if m.retry_count >= self.max_retries as i32 {
                    return Err(SyncError::Fatal(format!(
                        "transcription job for {book_id} exhausted retries"
                    )));
                }
                if Utc::now() - last_attempt.and_utc() < cooldown {
                    return Err(SyncError::Transient(
                        "transcription job in retry cooldown".into(),
                    ));
                }
            }
        } else {
            let am = entities::transcription_job::ActiveModel {
                book_id: Set(book_id.to_string()),
                state: Set(JobState::Running.as_str().to_string()),
                retry_count: Set(0),
                last_error: Set(None),
                last_attempt: Set(None),
                chunk_done: Set(serde_json::json!([])),
            };
            am.insert(self.db.as_ref())
                .await
                .map_err(|e| SyncError::Fatal(e.to_string()))?;
        }

        self.mark_state(book_id, JobState::Running, None).await?;

        for index in 0..chunk_count {
            if done.contains(&index) {
                continue;
            }
            let start = index as f64 * DEFAULT_CHUNK_SECONDS;
            let end = (start + DEFAULT_CHUNK_SECONDS).min(total_seconds);

            match self
                .transcriber
                .transcribe_chunk(book_id, audio_path, index, start, end)
                .await
            {
                Ok(chunk) => {
                    self.transcripts.append_chunk(
                        book_id,
                        TranscriptChunk {
                            start_seconds: chunk.start_seconds,
                            end_seconds: chunk.end_seconds,
                            text: chunk.text,
                        },
                    )?;
                    done.push(index);
                    self.save_progress(book_id, &done).await?;
                }
                Err(err) => {
                    self.record_failure(book_id, &err).await?;
                    return Err(err);
                }
            }
        }

        self.mark_state(book_id, JobState::Done, None).await?;
        Ok(())
    }

    async fn save_progress(&self, book_id: &str, done: &[u32]) -> SyncResult<()> {
        let mut am = entities::transcription_job::ActiveModel {
            book_id: Set(book_id.to_string()),
            ..Default::default()
        };
        am.chunk_done = Set(serde_json::json!(done));
        entities::transcription_job::Entity::update(am)
            .filter(entities::transcription_job::Column::BookId.eq(book_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn mark_state(
        &self,
        book_id: &str,
        state: JobState,
        error: Option<&str>,
    ) -> SyncResult<()> {
        let am = entities::transcription_job::ActiveModel {
            book_id: Set(book_id.to_string()),
            state: Set(state.as_str().to_string()),
            last_error: Set(error.map(|s| s.to_string())),
            last_attempt: Set(Some(Utc::now().naive_utc())),
            ..Default::default()
        };
        entities::transcription_job::Entity::update(am)
            .filter(entities::transcription_job::Column::BookId.eq(book_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn record_failure(&self, book_id: &str, err: &SyncError) -> SyncResult<()> {
        let existing = entities::transcription_job::Entity::find_by_id(book_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;
        let retry_count = existing.map(|m| m.retry_count + 1).unwrap_or(1);
        let am = entities::transcription_job::ActiveModel {
            book_id: Set(book_id.to_string()),
            state: Set(JobState::FailedRetryLater.as_str().to_string()),
            retry_count: Set(retry_count),
            last_error: Set(Some(err.to_string())),
            last_attempt: Set(Some(Utc::now().naive_utc())),
            ..Default::default()
        };
        entities::transcription_job::Entity::update(am)
            .filter(entities::transcription_job::Column::BookId.eq(book_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use sea_orm::Database;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    async fn test_db() -> Arc<DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Arc::new(db)
    }

    /// Fails chunk 3 on demand, so a test can simulate a crash mid-job and
    /// then flip it back to succeeding to simulate the process restarting.
    struct FlakyTranscriber {
        fail_chunk_three: AtomicBool,
        calls: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl Transcriber for FlakyTranscriber {
        async fn transcribe_chunk(
            &self,
            _book_id: &str,
            _audio_path: &str,
            chunk_index: u32,
            start_seconds: f64,
            end_seconds: f64,
        ) -> SyncResult<TranscribedChunk> {
            self.calls.lock().unwrap().push(chunk_index);
            if chunk_index == 3 && self.fail_chunk_three.load(Ordering::SeqCst) {
                return Err(SyncError::Transient("simulated crash".into()));
            }
            Ok(TranscribedChunk {
                index: chunk_index,
                start_seconds,
                end_seconds,
                text: format!("chunk {chunk_index}"),
            })
        }
    }

    #[tokio::test]
    async fn resumes_from_the_last_completed_chunk_after_a_crash() {
        let db = test_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let transcripts = Arc::new(TranscriptStore::new(tmp.path(), 3).unwrap());
        let transcriber = Arc::new(FlakyTranscriber {
            fail_chunk_three: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        });

        let jobs = JobManager::new(db, transcripts.clone(), transcriber.clone(), 5, 0);

        assert!(jobs.run("book1", "/tmp/book1.m4b", 2400.0).await.is_err());
        assert_eq!(*transcriber.calls.lock().unwrap(), vec![0, 1, 2, 3]);

        transcriber.fail_chunk_three.store(false, Ordering::SeqCst);
        transcriber.calls.lock().unwrap().clear();

        jobs.run("book1", "/tmp/book1.m4b", 2400.0).await.unwrap();
        assert_eq!(*transcriber.calls.lock().unwrap(), vec![3]);

        assert_eq!(transcripts.chunks("book1").unwrap().len(), 4);
    }
}
