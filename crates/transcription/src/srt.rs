//! SRT timestamp and document codec.
//!
//! Timestamps are millisecond integers everywhere in this crate; the clock
//! string form `HH:MM:SS,mmm` only exists at the file boundary. Parsing is
//! lenient by policy: a timestamp that does not match the pattern reads as 0
//! and a block with a bad timing line is dropped, never failing the whole
//! document.

use crate::transcript::Segment;

/// A parsed subtitle block: one timing line plus its text lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtBlock {
    pub start_ms: u64,
    pub end_ms: u64,
    pub lines: Vec<String>,
}

/// Parses `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) to milliseconds.
///
/// Returns `None` when the text does not match the pattern.
pub fn try_parse_timestamp(text: &str) -> Option<u64> {
    let text = text.trim();
    let mut clock = text.splitn(3, ':');
    let hours: u64 = clock.next()?.parse().ok()?;
    let minutes: u64 = clock.next()?.parse().ok()?;
    let rest = clock.next()?;
    // whisper-style log lines use '.' where SRT files use ','
    let (seconds, millis) = rest
        .split_once(',')
        .or_else(|| rest.split_once('.'))?;
    let seconds: u64 = seconds.parse().ok()?;
    let millis: u64 = millis.parse().ok()?;
    if minutes > 59 || seconds > 59 || millis > 999 {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Lenient timestamp parse: any non-match reads as 0.
///
/// Callers that need to distinguish "unparseable" from "midnight" use
/// [`try_parse_timestamp`] instead.
pub fn parse_timestamp(text: &str) -> u64 {
    try_parse_timestamp(text).unwrap_or(0)
}

/// Formats milliseconds as `HH:MM:SS,mmm`.
///
/// Negative input clamps to 0. The hours field grows unbounded for long
/// media (no modulo wrap).
pub fn format_timestamp(ms: i64) -> String {
    let ms = ms.max(0) as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1_000) % 60,
        ms % 1_000
    )
}

/// Renders segments as a numbered SRT document, sorted by start time.
///
/// Empty input yields an empty document. A segment whose text was entirely
/// blank renders a single placeholder line so every block keeps at least
/// one text line.
pub fn render(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return String::new();
    }

    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.start_ms);

    let mut out = String::new();
    for (i, seg) in ordered.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n",
            i + 1,
            format_timestamp(seg.start_ms as i64),
            format_timestamp(seg.end_ms as i64)
        ));
        if seg.lines.is_empty() {
            out.push_str(" \n");
        } else {
            for line in &seg.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// Parses an SRT document into blocks.
///
/// Splits on blank-line boundaries, tolerates an optional leading numeric
/// index line per block, and silently discards blocks whose timing line
/// does not parse.
pub fn parse(text: &str) -> Vec<SrtBlock> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().peekable();

    while lines.peek().is_some() {
        // Skip blank lines between blocks
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        let Some(first) = lines.next() else { break };
        let first = first.trim();

        // Optional index line, then the timing line
        let timing = if first.chars().all(|c| c.is_ascii_digit()) && !first.is_empty() {
            match lines.next() {
                Some(l) => l.trim().to_string(),
                None => break,
            }
        } else {
            first.to_string()
        };

        let parsed = parse_timing_line(&timing);

        let mut text_lines = Vec::new();
        while lines.peek().is_some_and(|l| !l.trim().is_empty()) {
            let line = lines.next().unwrap_or_default().trim().to_string();
            if !line.is_empty() {
                text_lines.push(line);
            }
        }

        if let Some((start_ms, end_ms)) = parsed {
            blocks.push(SrtBlock {
                start_ms,
                end_ms,
                lines: text_lines,
            });
        }
    }
    blocks
}

/// Adds `offset_ms` to every block's start and end, clamping each to >= 0
/// independently.
pub fn shift(blocks: &mut [SrtBlock], offset_ms: i64) {
    for block in blocks {
        block.start_ms = (block.start_ms as i64 + offset_ms).max(0) as u64;
        block.end_ms = (block.end_ms as i64 + offset_ms).max(0) as u64;
    }
}

/// Parses `"HH:MM:SS,mmm --> HH:MM:SS,mmm"`.
fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once("-->")?;
    Some((try_parse_timestamp(start)?, try_parse_timestamp(end)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:02,965"), 2_965);
        assert_eq!(parse_timestamp("00:01:30.500"), 90_500);
        assert_eq!(parse_timestamp("01:00:00,000"), 3_600_000);
        assert_eq!(parse_timestamp("99:00:00,001"), 99 * 3_600_000 + 1);
    }

    #[test]
    fn test_parse_timestamp_lenient_zero() {
        assert_eq!(parse_timestamp(""), 0);
        assert_eq!(parse_timestamp("garbage"), 0);
        assert_eq!(parse_timestamp("12:34"), 0);
        assert_eq!(parse_timestamp("00:99:00,000"), 0);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(2_965), "00:00:02,965");
        assert_eq!(format_timestamp(-42), "00:00:00,000");
        // hours are not wrapped
        assert_eq!(format_timestamp(100 * 3_600_000), "100:00:00,000");
    }

    #[test]
    fn test_timestamp_round_trip() {
        for ms in [0u64, 1, 999, 1_000, 59_999, 3_599_999, 3_600_000, 86_400_000] {
            assert_eq!(parse_timestamp(&format_timestamp(ms as i64)), ms);
        }
    }

    #[test]
    fn test_render_matches_expected_blocks() {
        let segments = vec![
            Segment::new("a", 1_000, 2_500, "Hello"),
            Segment::new("b", 2_500, 4_000, "world"),
        ];
        assert_eq!(
            render(&segments),
            "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:02,500 --> 00:00:04,000\nworld\n\n"
        );
    }

    #[test]
    fn test_render_empty_is_empty() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_render_sorts_by_start() {
        let segments = vec![
            Segment::new("b", 5_000, 6_000, "second"),
            Segment::new("a", 1_000, 2_000, "first"),
        ];
        let doc = render(&segments);
        assert!(doc.starts_with("1\n00:00:01,000"));
        assert!(doc.contains("2\n00:00:05,000"));
    }

    #[test]
    fn test_parse_document() {
        let doc = "1\n00:00:01,000 --> 00:00:02,500\nHello\nthere\n\n2\n00:00:02,500 --> 00:00:04,000\nworld\n\n";
        let blocks = parse(doc);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].start_ms, 1_000);
        assert_eq!(blocks[0].end_ms, 2_500);
        assert_eq!(blocks[0].lines, vec!["Hello", "there"]);
        assert_eq!(blocks[1].lines, vec!["world"]);
    }

    #[test]
    fn test_parse_document_without_index_lines() {
        let doc = "00:00:01,000 --> 00:00:02,000\nno index\n\n";
        let blocks = parse(doc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines, vec!["no index"]);
    }

    #[test]
    fn test_parse_document_discards_bad_blocks() {
        let doc = "1\nnot a timing line\nwhatever\n\n2\n00:00:05,000 --> 00:00:06,000\nkept\n\n";
        let blocks = parse(doc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines, vec!["kept"]);
    }

    #[test]
    fn test_render_parse_round_trip() {
        let segments = vec![
            Segment::new("a", 0, 1_200, "one"),
            Segment::new("b", 1_200, 3_000, "two\nlines"),
        ];
        let rendered = render(&segments);
        let reparsed: Vec<Segment> = parse(&rendered)
            .into_iter()
            .map(Segment::from_block)
            .collect();
        assert_eq!(render(&reparsed), rendered);
    }

    #[test]
    fn test_shift_clamps_independently() {
        let mut blocks = vec![SrtBlock {
            start_ms: 500,
            end_ms: 1_500,
            lines: vec!["x".into()],
        }];
        shift(&mut blocks, -1_000);
        assert_eq!(blocks[0].start_ms, 0);
        assert_eq!(blocks[0].end_ms, 500);

        shift(&mut blocks, 10_000);
        assert_eq!(blocks[0].start_ms, 10_000);
        assert_eq!(blocks[0].end_ms, 10_500);
    }
}
