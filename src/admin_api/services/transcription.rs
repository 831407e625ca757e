use std::sync::Arc;

use poem_openapi::payload::Json;

use crate::admin_api::models::{AlignmentBuildResponse, ErrorDto};
use crate::align::builder::{build_alignment_map, TranscriptToken};
use crate::domain::models::SyncMode;
use crate::locate;
use crate::storage::Store;
use crate::transcribe::JobManager;

pub struct TranscriptionService {
    store: Arc<Store>,
    jobs: Arc<JobManager>,
    data_dir: String,
}

impl TranscriptionService {
    pub fn new(store: Arc<Store>, jobs: Arc<JobManager>, data_dir: String) -> Self {
        TranscriptionService {
            store,
            jobs,
            data_dir,
        }
    }

    /// Transcribe (or resume transcribing) the book's audio, then build an
    /// alignment map against its ebook text and persist both (spec §4.4
    /// Construction, §4.9 resumable jobs).
    pub async fn build_alignment(&self, book_id: &str) -> AlignmentBuildResponse {
        let mapping = match self.store.load_mapping(book_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                return AlignmentBuildResponse::NotFound(Json(ErrorDto {
                    message: format!("no mapping for {book_id}"),
                }));
            }
            Err(e) => {
                return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                    message: e.to_string(),
                }));
            }
        };

        if mapping.sync_mode != SyncMode::Audiobook {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: "alignment only applies to audiobook mappings".to_string(),
            }));
        }
        let Some(duration) = mapping.duration_seconds else {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: "mapping has no known duration".to_string(),
            }));
        };

        let audio_path = format!("{}/audio_cache/{}.m4b", self.data_dir, book_id);
        if let Err(e) = self.jobs.run(book_id, &audio_path, duration).await {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: format!("transcription failed: {e}"),
            }));
        }

        let tokens = match self.jobs.transcripts().chunks(book_id) {
            Ok(chunks) => chunks_to_tokens(&chunks),
            Err(e) => {
                return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                    message: e.to_string(),
                }));
            }
        };

        let ebook_path = format!("{}/ebooks/{}.xhtml", self.data_dir, book_id);
        let ebook_raw = match std::fs::read_to_string(&ebook_path) {
            Ok(raw) => raw,
            Err(e) => {
                return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                    message: format!("reading ebook at {ebook_path}: {e}"),
                }));
            }
        };
        let doc = locate::parse(&ebook_raw);

        let map = match build_alignment_map(&tokens, &doc.full_text) {
            Ok(map) => map,
            Err(e) => {
                return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                    message: e.to_string(),
                }));
            }
        };

        let alignments_dir = format!("{}/alignments", self.data_dir);
        if let Err(e) = std::fs::create_dir_all(&alignments_dir) {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            }));
        }
        let alignment_path = format!("{alignments_dir}/{book_id}.json");
        let serialized = match serde_json::to_string(&map) {
            Ok(s) => s,
            Err(e) => {
                return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                    message: e.to_string(),
                }));
            }
        };
        if let Err(e) = std::fs::write(&alignment_path, serialized) {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            }));
        }

        if let Err(e) = self.store.save_alignment_anchors(book_id, map.anchors()).await {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            }));
        }

        let mut mapping = mapping;
        mapping.alignment_ref = Some(alignment_path.clone());
        if let Err(e) = self.store.upsert_mapping(&mapping).await {
            return AlignmentBuildResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            }));
        }

        AlignmentBuildResponse::Ok(Json(crate::admin_api::models::AlignmentBuildResultDto {
            book_id: book_id.to_string(),
            anchor_count: map.anchors().len(),
            alignment_path,
        }))
    }
}

/// Approximates word-level tokens by splitting each chunk's text on
/// whitespace and interpolating timestamps evenly across its time span,
/// since the transcriber only reports chunk-level boundaries.
fn chunks_to_tokens(chunks: &[crate::transcribe::TranscriptChunk]) -> Vec<TranscriptToken> {
    let mut tokens = Vec::new();
    for chunk in chunks {
        let words: Vec<&str> = chunk.text.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let span = (chunk.end_seconds - chunk.start_seconds).max(f64::EPSILON);
        let step = span / words.len() as f64;
        for (i, word) in words.iter().enumerate() {
            let start = chunk.start_seconds + step * i as f64;
            let end = (start + step).min(chunk.end_seconds);
            tokens.push(TranscriptToken {
                text: word.to_string(),
                start_seconds: start,
                end_seconds: end,
            });
        }
    }
    tokens
}
