//! Alignment map (C4, spec §4.4): a monotonic correlation between ebook
//! character offsets and audio timestamps, built once per book from its
//! transcript and looked up on every sync cycle that crosses coordinate
//! systems.

pub mod builder;

pub use builder::{build_alignment_map, TranscriptToken};

use serde::{Deserialize, Serialize};

pub const MIN_ANCHORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub char_offset: i64,
    pub audio_timestamp_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentMap {
    anchors: Vec<Anchor>,
}

impl AlignmentMap {
    /// Anchors must already be sorted by `char_offset` and strictly
    /// monotonic in `audio_timestamp_seconds`; the builder is responsible
    /// for enforcing that before constructing a map.
    pub fn new(anchors: Vec<Anchor>) -> Self {
        AlignmentMap { anchors }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn time_to_char(&self, ts: f64) -> i64 {
        if self.anchors.is_empty() {
            return 0;
        }
        if ts <= self.anchors[0].audio_timestamp_seconds {
            return self.anchors[0].char_offset;
        }
        let last = self.anchors.len() - 1;
        if ts >= self.anchors[last].audio_timestamp_seconds {
            return self.anchors[last].char_offset;
        }

        let idx = self
            .anchors
            .partition_point(|a| a.audio_timestamp_seconds <= ts)
            .saturating_sub(1);
        let a = &self.anchors[idx];
        let b = &self.anchors[idx + 1];
        let span_ts = b.audio_timestamp_seconds - a.audio_timestamp_seconds;
        if span_ts <= 0.0 {
            return a.char_offset;
        }
        let fraction = (ts - a.audio_timestamp_seconds) / span_ts;
        a.char_offset + ((b.char_offset - a.char_offset) as f64 * fraction).round() as i64
    }

    pub fn char_to_time(&self, ch: i64) -> f64 {
        if self.anchors.is_empty() {
            return 0.0;
        }
        if ch <= self.anchors[0].char_offset {
            return self.anchors[0].audio_timestamp_seconds;
        }
        let last = self.anchors.len() - 1;
        if ch >= self.anchors[last].char_offset {
            return self.anchors[last].audio_timestamp_seconds;
        }

        let idx = self
            .anchors
            .partition_point(|a| a.char_offset <= ch)
            .saturating_sub(1);
        let a = &self.anchors[idx];
        let b = &self.anchors[idx + 1];
        let span_ch = (b.char_offset - a.char_offset) as f64;
        if span_ch <= 0.0 {
            return a.audio_timestamp_seconds;
        }
        let fraction = (ch - a.char_offset) as f64 / span_ch;
        a.audio_timestamp_seconds
            + (b.audio_timestamp_seconds - a.audio_timestamp_seconds) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> AlignmentMap {
        AlignmentMap::new(vec![
            Anchor { char_offset: 0, audio_timestamp_seconds: 0.0 },
            Anchor { char_offset: 500, audio_timestamp_seconds: 50.0 },
            Anchor { char_offset: 1000, audio_timestamp_seconds: 110.0 },
        ])
    }

    #[test]
    fn time_to_char_interpolates() {
        let map = sample_map();
        assert_eq!(map.time_to_char(55.0), 550);
    }

    #[test]
    fn char_to_time_interpolates() {
        let map = sample_map();
        let ts = map.char_to_time(550);
        assert!((ts - 55.0).abs() < 1.0);
    }

    #[test]
    fn clamps_outside_bounds() {
        let map = sample_map();
        assert_eq!(map.time_to_char(-5.0), 0);
        assert_eq!(map.time_to_char(500.0), 1000);
        assert_eq!(map.char_to_time(-5), 0);
        assert!((map.char_to_time(5000) - 110.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_within_epsilon() {
        let map = sample_map();
        for anchor in map.anchors() {
            let ch = map.time_to_char(anchor.audio_timestamp_seconds);
            assert!((ch - anchor.char_offset).abs() <= 2);
            let ts = map.char_to_time(anchor.char_offset);
            assert!((ts - anchor.audio_timestamp_seconds).abs() <= 0.5);
        }
    }
}
