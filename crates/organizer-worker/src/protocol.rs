//! Line protocol handling for worker stdout
//!
//! The worker writes plain text lines. Two kinds are recognized:
//! - `STATUS:<json>` carries a status document
//! - any line containing `새 파일 감지: <path>` announces a new file
//!
//! Everything else is an opaque log line.

use std::sync::LazyLock;

use regex::Regex;

use organizer_core::prelude::*;
use organizer_core::WorkerLine;

/// Prefix that marks a status line
pub const STATUS_PREFIX: &str = "STATUS:";

/// Phrase the worker logs when its file watcher sees a new file
pub const DETECTION_MARKER: &str = "새 파일 감지: ";

/// Captures everything after the marker phrase.
static DETECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{}(.+)$", regex::escape(DETECTION_MARKER)))
        .expect("Invalid detection regex")
});

// ─────────────────────────────────────────────────────────
// Line classification
// ─────────────────────────────────────────────────────────

/// Classify one complete line of worker stdout.
///
/// # Arguments
/// * `line` - A single line without its trailing newline
///
/// # Returns
/// The [`WorkerLine`] variant for the line. Never fails; malformed status
/// payloads come back as [`WorkerLine::InvalidStatus`].
pub fn parse_worker_line(line: &str) -> WorkerLine {
    if let Some(payload) = line.strip_prefix(STATUS_PREFIX) {
        return match serde_json::from_str(payload) {
            Ok(value) => WorkerLine::Status(value),
            Err(e) => WorkerLine::InvalidStatus {
                payload: payload.to_string(),
                error: e.to_string(),
            },
        };
    }

    if let Some(path) = extract_detected_path(line) {
        return WorkerLine::FileDetected { path };
    }

    WorkerLine::Log(line.to_string())
}

/// Extract the path following the detection marker, if present.
///
/// Surrounding whitespace is trimmed; an empty remainder is not a match.
pub fn extract_detected_path(line: &str) -> Option<String> {
    let captures = DETECTION_PATTERN.captures(line)?;
    let path = captures.get(1)?.as_str().trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

// ─────────────────────────────────────────────────────────
// Line reassembly
// ─────────────────────────────────────────────────────────

/// Longest line kept; anything longer is dropped up to its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles lines from arbitrarily chunked stdout reads.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte UTF-8 sequences
/// split across reads decode correctly. A trailing `\r` is stripped.
/// A line that grows past the length cap is discarded whole.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_len: usize,
    /// Inside an over-long line; bytes are dropped until the next newline
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_len(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let segment = &rest[..pos];
            if self.discarding {
                self.discarding = false;
            } else if self.pending.len() + segment.len() > self.max_len {
                self.warn_discard();
            } else {
                self.pending.extend_from_slice(segment);
                lines.push(Self::decode(&self.pending));
            }
            self.pending.clear();
            rest = &rest[pos + 1..];
        }

        if !self.discarding {
            if self.pending.len() + rest.len() > self.max_len {
                self.warn_discard();
                self.pending.clear();
                self.discarding = true;
            } else {
                self.pending.extend_from_slice(rest);
            }
        }
        lines
    }

    /// Flush the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) || self.pending.is_empty() {
            self.pending.clear();
            return None;
        }
        let line = Self::decode(&self.pending);
        self.pending.clear();
        Some(line)
    }

    fn warn_discard(&self) {
        warn!(
            "Discarding worker output line longer than {} bytes",
            self.max_len
        );
    }

    fn decode(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_status_line() {
        let line = parse_worker_line(r#"STATUS:{"phase":"scanning"}"#);
        assert_eq!(line, WorkerLine::Status(json!({"phase": "scanning"})));
    }

    #[test]
    fn test_parse_status_line_non_object_payload() {
        let line = parse_worker_line("STATUS:42");
        assert_eq!(line, WorkerLine::Status(json!(42)));
    }

    #[test]
    fn test_parse_malformed_status_line() {
        let line = parse_worker_line("STATUS:{not valid json");
        match line {
            WorkerLine::InvalidStatus { payload, error } => {
                assert_eq!(payload, "{not valid json");
                assert!(!error.is_empty());
            }
            other => panic!("expected InvalidStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_status_prefix_must_start_line() {
        let line = parse_worker_line(r#"log: STATUS:{"a":1}"#);
        assert!(matches!(line, WorkerLine::Log(_)));
    }

    #[test]
    fn test_parse_detection_line() {
        let line = parse_worker_line("새 파일 감지: /tmp/a.txt");
        assert_eq!(
            line,
            WorkerLine::FileDetected {
                path: "/tmp/a.txt".to_string()
            }
        );
    }

    #[test]
    fn test_detection_marker_inside_log_prefix() {
        let line = parse_worker_line(
            "2024-01-15 10:00:00 | INFO | file_watcher:on_created:27 - 새 파일 감지: C:/Downloads/보고서.pdf",
        );
        assert_eq!(
            line,
            WorkerLine::FileDetected {
                path: "C:/Downloads/보고서.pdf".to_string()
            }
        );
    }

    #[test]
    fn test_detection_path_with_spaces() {
        assert_eq!(
            extract_detected_path("새 파일 감지: /home/me/My Files/a b.txt  "),
            Some("/home/me/My Files/a b.txt".to_string())
        );
    }

    #[test]
    fn test_detection_marker_without_path() {
        assert_eq!(extract_detected_path("새 파일 감지: "), None);
        assert!(matches!(
            parse_worker_line("새 파일 감지:    "),
            WorkerLine::Log(_)
        ));
    }

    #[test]
    fn test_other_lines_are_logs() {
        assert_eq!(
            parse_worker_line("파일 수정 감지: /tmp/a.txt"),
            WorkerLine::Log("파일 수정 감지: /tmp/a.txt".to_string())
        );
        assert_eq!(parse_worker_line(""), WorkerLine::Log(String::new()));
    }

    #[test]
    fn test_line_buffer_reassembles_split_status() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"STATUS:{\"a\"").is_empty());

        let lines = buffer.push(b":1}\n");
        assert_eq!(lines, vec![r#"STATUS:{"a":1}"#.to_string()]);
        assert_eq!(buffer.finish(), None);

        let events: Vec<_> = lines
            .iter()
            .filter_map(|l| parse_worker_line(l).into_event())
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_line_buffer_multiple_lines_in_one_chunk() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\ntwo\nthr");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);

        let lines = buffer.push(b"ee\n");
        assert_eq!(lines, vec!["three".to_string()]);
    }

    #[test]
    fn test_line_buffer_strips_carriage_return() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"windows\r\n"), vec!["windows".to_string()]);
    }

    #[test]
    fn test_line_buffer_handles_utf8_split_across_chunks() {
        let text = "새 파일 감지: /tmp/가.txt\n".as_bytes();
        let mut buffer = LineBuffer::new();

        // Split in the middle of the first three-byte Hangul syllable
        assert!(buffer.push(&text[..1]).is_empty());
        let lines = buffer.push(&text[1..]);

        assert_eq!(lines.len(), 1);
        assert_eq!(
            parse_worker_line(&lines[0]),
            WorkerLine::FileDetected {
                path: "/tmp/가.txt".to_string()
            }
        );
    }

    #[test]
    fn test_line_buffer_finish_flushes_remainder() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"partial");
        assert_eq!(buffer.finish(), Some("partial".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_drops_overlong_line_across_chunks() {
        let mut buffer = LineBuffer::with_max_len(8);

        assert!(buffer.push(b"0123456789").is_empty());
        assert!(buffer.push(b"more bytes").is_empty());
        assert_eq!(buffer.push(b"tail\nok\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn test_line_buffer_drops_overlong_line_in_one_chunk() {
        let mut buffer = LineBuffer::with_max_len(8);

        let lines = buffer.push(b"12345678\n0123456789\nSTATUS:1\n");
        assert_eq!(lines, vec!["12345678".to_string(), "STATUS:1".to_string()]);
    }

    #[test]
    fn test_line_buffer_overlong_tail_not_flushed() {
        let mut buffer = LineBuffer::with_max_len(4);
        buffer.push(b"abcdefgh");
        assert_eq!(buffer.finish(), None);

        // The buffer is usable again afterwards
        assert_eq!(buffer.push(b"ok\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn test_line_buffer_byte_at_a_time() {
        let input = b"STATUS:{\"phase\":\"idle\"}\nhello\n";
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for byte in input.iter() {
            lines.extend(buffer.push(std::slice::from_ref(byte)));
        }
        assert_eq!(
            lines,
            vec![r#"STATUS:{"phase":"idle"}"#.to_string(), "hello".to_string()]
        );
    }
}
