//! Canonical in-memory transcript: timed segments merged by identity.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::srt::{self, SrtBlock};

/// Assumed reading rate when a backend omits an end timestamp.
const READING_RATE_WPM: u64 = 187;

/// Floor for estimated durations so a one-word segment stays readable.
const MIN_ESTIMATED_DURATION_MS: u64 = 1_000;

/// One subtitle segment: a time range plus its display lines.
///
/// `id` is the stable identity used for update-in-place during streaming —
/// backend-provided when available, synthesized from (start, end, text)
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Non-empty display lines; blank input lines are filtered at
    /// construction. May be empty when all input was blank — the renderer
    /// substitutes a placeholder line in that case.
    pub lines: Vec<String>,
}

impl Segment {
    /// Builds a segment, splitting `text` into trimmed non-blank lines and
    /// normalizing the time range: an end at or before the start is pushed
    /// out by the estimated reading duration of the text.
    pub fn new(id: impl Into<String>, start_ms: u64, end_ms: u64, text: &str) -> Self {
        let lines: Vec<String> = text
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let end_ms = if end_ms > start_ms {
            end_ms
        } else {
            start_ms + estimate_duration_ms(text)
        };
        Self {
            id: id.into(),
            start_ms,
            end_ms,
            lines,
        }
    }

    /// Segment from a parsed SRT block, with a synthesized identity.
    pub fn from_block(block: SrtBlock) -> Self {
        let text = block.lines.join("\n");
        let id = synthetic_id(block.start_ms, block.end_ms, &text);
        Self::new(id, block.start_ms, block.end_ms, &text)
    }

    /// True when the segment has no displayable text at all.
    pub fn is_blank(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Identity for segments the backend did not name: derived from the time
/// range and a hash of the text.
pub fn synthetic_id(start_ms: u64, end_ms: u64, text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{}:{}:{:016x}", start_ms, end_ms, hasher.finish())
}

/// Estimated display duration of `text` at the fixed reading rate.
pub fn estimate_duration_ms(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    (words * 60_000 / READING_RATE_WPM).max(MIN_ESTIMATED_DURATION_MS)
}

/// The whole transcript of one session: segments ordered by start time,
/// with an id → position index for update-in-place.
///
/// Invariant after every successful `upsert`/`reset_all`: the sequence is
/// sorted ascending by `start_ms` (stable among equal starts) and every id
/// maps to exactly one valid position.
#[derive(Debug, Default)]
pub struct TranscriptDoc {
    segments: Vec<Segment>,
    positions: HashMap<String, usize>,
}

impl TranscriptDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a segment by id.
    ///
    /// A known id replaces that entry's content in place without disturbing
    /// order; a new id appends and re-sorts the collection. Returns `false`
    /// (no-op) when the segment carries no text after trimming.
    pub fn upsert(&mut self, segment: Segment) -> bool {
        if segment.is_blank() {
            return false;
        }
        match self.positions.get(&segment.id) {
            Some(&pos) => {
                self.segments[pos] = segment;
            }
            None => {
                self.segments.push(segment);
                self.resort();
            }
        }
        true
    }

    /// Atomically replaces the entire collection. Used when a backend's
    /// final transcript supersedes interim streaming state.
    pub fn reset_all(&mut self, segments: Vec<Segment>) {
        self.segments.clear();
        self.positions.clear();
        for segment in segments {
            self.upsert(segment);
        }
    }

    /// Renders the current sequence as an SRT document.
    pub fn render(&self) -> String {
        srt::render(&self.segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Stable sort by start time, then rebuild the id index.
    fn resort(&mut self) {
        self.segments.sort_by_key(|s| s.start_ms);
        self.positions.clear();
        for (i, segment) in self.segments.iter().enumerate() {
            self.positions.insert(segment.id.clone(), i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_filters_blank_lines() {
        let seg = Segment::new("a", 0, 1_000, "one\n\n  \ntwo");
        assert_eq!(seg.lines, vec!["one", "two"]);
    }

    #[test]
    fn test_segment_normalizes_end() {
        let seg = Segment::new("a", 5_000, 5_000, "hello world");
        assert!(seg.end_ms > seg.start_ms);
        // two words at 187 wpm is under the 1s floor
        assert_eq!(seg.end_ms, 6_000);
    }

    #[test]
    fn test_estimate_duration() {
        // 187 words read for exactly one minute
        let many = vec!["word"; 187].join(" ");
        assert_eq!(estimate_duration_ms(&many), 60_000);
        assert_eq!(estimate_duration_ms("hi"), 1_000);
    }

    #[test]
    fn test_upsert_new_ids_grow_and_stay_sorted() {
        let mut doc = TranscriptDoc::new();
        assert!(doc.upsert(Segment::new("b", 4_000, 5_000, "later")));
        assert!(doc.upsert(Segment::new("a", 1_000, 2_000, "earlier")));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.segments()[0].id, "a");
        assert_eq!(doc.segments()[1].id, "b");
    }

    #[test]
    fn test_upsert_existing_id_keeps_length() {
        let mut doc = TranscriptDoc::new();
        doc.upsert(Segment::new("a", 1_000, 2_000, "draft"));
        doc.upsert(Segment::new("b", 3_000, 4_000, "other"));
        assert!(doc.upsert(Segment::new("a", 1_000, 2_200, "refined")));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.segments()[0].lines, vec!["refined"]);
        assert_eq!(doc.segments()[0].end_ms, 2_200);
    }

    #[test]
    fn test_upsert_blank_text_is_noop() {
        let mut doc = TranscriptDoc::new();
        assert!(!doc.upsert(Segment::new("a", 0, 1_000, "   \n  ")));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_equal_starts_keep_insertion_order() {
        let mut doc = TranscriptDoc::new();
        doc.upsert(Segment::new("first", 1_000, 2_000, "one"));
        doc.upsert(Segment::new("second", 1_000, 2_000, "two"));
        assert_eq!(doc.segments()[0].id, "first");
        assert_eq!(doc.segments()[1].id, "second");
    }

    #[test]
    fn test_reset_all_replaces_everything() {
        let mut doc = TranscriptDoc::new();
        doc.upsert(Segment::new("interim", 0, 1_000, "draft"));
        doc.reset_all(vec![
            Segment::new("f2", 5_000, 6_000, "final two"),
            Segment::new("f1", 1_000, 2_000, "final one"),
        ]);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.segments()[0].id, "f1");
        assert!(doc.render().contains("final two"));
        assert!(!doc.render().contains("draft"));
    }

    #[test]
    fn test_synthetic_id_distinguishes_text() {
        assert_ne!(synthetic_id(0, 1, "a"), synthetic_id(0, 1, "b"));
        assert_eq!(synthetic_id(0, 1, "a"), synthetic_id(0, 1, "a"));
    }
}
