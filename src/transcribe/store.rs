use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Disk-backed transcript chunks with a small in-memory cache, mirroring the
/// bounded parsed-artifact cache the ebook locator keeps (spec §5 "bounded
/// memory for parsed/derived artifacts").
pub struct TranscriptStore {
    dir: PathBuf,
    cache: Mutex<LruCache<String, Vec<TranscriptChunk>>>,
}

impl TranscriptStore {
    pub fn new(data_dir: impl AsRef<Path>, cache_capacity: usize) -> std::io::Result<Self> {
        let dir = data_dir.as_ref().join("transcripts");
        fs::create_dir_all(&dir)?;
        let capacity = std::num::NonZeroUsize::new(cache_capacity.max(1)).unwrap();
        Ok(TranscriptStore {
            dir,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn path_for(&self, book_id: &str) -> PathBuf {
        self.dir.join(format!("{book_id}.json"))
    }

    fn load(&self, book_id: &str) -> SyncResult<Vec<TranscriptChunk>> {
        if let Some(chunks) = self.cache.lock().unwrap().get(book_id) {
            return Ok(chunks.clone());
        }
        let path = self.path_for(book_id);
        let chunks = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| SyncError::Fatal(format!("reading transcript: {e}")))?;
            serde_json::from_str(&raw)
                .map_err(|e| SyncError::Fatal(format!("parsing transcript: {e}")))?
        } else {
            Vec::new()
        };
        self.cache
            .lock()
            .unwrap()
            .put(book_id.to_string(), chunks.clone());
        Ok(chunks)
    }

    pub fn append_chunk(&self, book_id: &str, chunk: TranscriptChunk) -> SyncResult<()> {
        let mut chunks = self.load(book_id)?;
        chunks.push(chunk);
        chunks.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        let raw = serde_json::to_string(&chunks)
            .map_err(|e| SyncError::Fatal(format!("serializing transcript: {e}")))?;
        fs::write(self.path_for(book_id), raw)
            .map_err(|e| SyncError::Fatal(format!("writing transcript: {e}")))?;
        self.cache
            .lock()
            .unwrap()
            .put(book_id.to_string(), chunks);
        Ok(())
    }

    pub fn has_transcript(&self, book_id: &str) -> bool {
        self.path_for(book_id).exists()
    }

    /// All chunks in time order, for callers that build derived artifacts
    /// (e.g. the alignment builder, C4) rather than just reading a snippet.
    pub fn chunks(&self, book_id: &str) -> SyncResult<Vec<TranscriptChunk>> {
        self.load(book_id)
    }

    /// Approximate text window around `timestamp_seconds`, used to feed the
    /// translator's audio-to-text direction (spec §4.6).
    pub fn snippet_near(
        &self,
        book_id: &str,
        timestamp_seconds: f64,
        window_chars: usize,
    ) -> SyncResult<String> {
        let chunks = self.load(book_id)?;
        if chunks.is_empty() {
            return Err(SyncError::NotFound(format!(
                "no transcript for book {book_id}"
            )));
        }

        let chunk = chunks
            .iter()
            .find(|c| timestamp_seconds >= c.start_seconds && timestamp_seconds < c.end_seconds)
            .unwrap_or_else(|| {
                if timestamp_seconds < chunks[0].start_seconds {
                    &chunks[0]
                } else {
                    chunks.last().unwrap()
                }
            });

        let span = (chunk.end_seconds - chunk.start_seconds).max(f64::EPSILON);
        let fraction = ((timestamp_seconds - chunk.start_seconds) / span).clamp(0.0, 1.0);
        let center = (chunk.text.len() as f64 * fraction) as usize;
        let half = window_chars / 2;
        let start = center.saturating_sub(half);
        let end = (center + half).min(chunk.text.len());
        Ok(chunk.text[start..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_near_picks_the_containing_chunk() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(tmp.path(), 3).unwrap();
        store
            .append_chunk(
                "book1",
                TranscriptChunk {
                    start_seconds: 0.0,
                    end_seconds: 600.0,
                    text: "a".repeat(1000),
                },
            )
            .unwrap();
        store
            .append_chunk(
                "book1",
                TranscriptChunk {
                    start_seconds: 600.0,
                    end_seconds: 1200.0,
                    text: "b".repeat(1000),
                },
            )
            .unwrap();

        let snippet = store.snippet_near("book1", 650.0, 100).unwrap();
        assert!(snippet.chars().all(|c| c == 'b'));
    }

    #[test]
    fn snippet_near_missing_book_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(tmp.path(), 3).unwrap();
        assert!(store.snippet_near("nope", 1.0, 10).is_err());
    }
}
