//! Two-pass n-gram anchoring (spec §4.4 "Construction").

use crate::align::{Anchor, AlignmentMap, MIN_ANCHORS};
use crate::errors::{SyncError, SyncResult};
use crate::textnorm::{count_occurrences, find_first, normalize};

#[derive(Debug, Clone)]
pub struct TranscriptToken {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

const PASS1_WINDOW: usize = 12;
const PASS2_WINDOW: usize = 6;
const BACKFILL_THRESHOLD_SECONDS: f64 = 30.0;

/// Build an alignment map from a flat, time-ordered token stream and the
/// ebook's full text. Rejects if fewer than `MIN_ANCHORS` anchors survive
/// monotonicity enforcement.
pub fn build_alignment_map(tokens: &[TranscriptToken], ebook_text: &str) -> SyncResult<AlignmentMap> {
    let ebook_normalized = normalize(ebook_text);
    if ebook_normalized.is_empty() || tokens.is_empty() {
        return Err(SyncError::InvalidData(
            "cannot build alignment from empty transcript or ebook text".into(),
        ));
    }

    let mut anchors = anchor_pass(tokens, &ebook_normalized, 0, tokens.len(), PASS1_WINDOW);

    if let Some(first) = anchors.first() {
        if first.audio_timestamp_seconds > BACKFILL_THRESHOLD_SECONDS {
            let backfill_end = tokens
                .iter()
                .position(|t| t.start_seconds >= first.audio_timestamp_seconds)
                .unwrap_or(tokens.len());
            let mut backfilled =
                anchor_pass(tokens, &ebook_normalized, 0, backfill_end, PASS2_WINDOW);
            backfilled.extend(anchors);
            anchors = backfilled;
        }
    }

    anchors.sort_by_key(|a| a.char_offset);
    let monotonic = enforce_monotonicity(anchors);

    if monotonic.len() < MIN_ANCHORS {
        return Err(SyncError::InvalidData(format!(
            "alignment build yielded {} anchors, need at least {}",
            monotonic.len(),
            MIN_ANCHORS
        )));
    }

    Ok(AlignmentMap::new(monotonic))
}

fn anchor_pass(
    tokens: &[TranscriptToken],
    ebook_normalized: &crate::textnorm::Normalized,
    start: usize,
    end: usize,
    window: usize,
) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut i = start;
    while i + window <= end {
        let chunk = &tokens[i..i + window];
        let joined = chunk
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let query = normalize(&joined);

        if !query.is_empty() && count_occurrences(&ebook_normalized.chars, &query.chars) == 1 {
            if let Some(offset) = find_first(&ebook_normalized.chars, &query.chars) {
                let char_offset = ebook_normalized.origin_at(offset) as i64;
                let audio_ts = chunk.last().unwrap().end_seconds;
                anchors.push(Anchor {
                    char_offset,
                    audio_timestamp_seconds: audio_ts,
                });
            }
        }
        i += window;
    }
    anchors
}

fn enforce_monotonicity(anchors: Vec<Anchor>) -> Vec<Anchor> {
    let mut result: Vec<Anchor> = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        match result.last() {
            Some(prev) if anchor.audio_timestamp_seconds <= prev.audio_timestamp_seconds => {
                continue;
            }
            Some(prev) if anchor.char_offset <= prev.char_offset => {
                continue;
            }
            _ => result.push(anchor),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, start: f64, end: f64) -> TranscriptToken {
        TranscriptToken {
            text: text.to_string(),
            start_seconds: start,
            end_seconds: end,
        }
    }

    #[test]
    fn rejects_too_few_anchors() {
        let tokens = vec![token("hello", 0.0, 1.0), token("world", 1.0, 2.0)];
        let result = build_alignment_map(&tokens, "hello world, a short book.");
        assert!(result.is_err());
    }

    #[test]
    fn builds_monotonic_anchors_from_matching_transcript() {
        let words = [
            "the", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog", "and", "then",
            "runs", "away", "into", "the", "deep", "dark", "forest", "looking", "for", "food",
            "and", "shelter", "before", "nightfall", "comes", "upon", "the", "land", "again",
            "soon", "after", "dawn", "breaks", "clear", "and",
        ];
        let mut tokens = Vec::new();
        for (i, w) in words.iter().enumerate() {
            let t = i as f64;
            tokens.push(token(w, t, t + 1.0));
        }
        let ebook_text = words.join(" ");
        let map = build_alignment_map(&tokens, &ebook_text).unwrap();
        let anchors = map.anchors();
        assert!(anchors.len() >= MIN_ANCHORS);
        for pair in anchors.windows(2) {
            assert!(pair[0].char_offset < pair[1].char_offset);
            assert!(pair[0].audio_timestamp_seconds < pair[1].audio_timestamp_seconds);
        }
    }
}
