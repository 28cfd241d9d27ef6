//! Lesson-aware text chunker.
//!
//! Splits a course document into [`CourseChunk`]s. The document is first
//! segmented on `Lesson N:` boundary markers (text before the first marker
//! is course-level preamble, tagged with no lesson number), then each
//! segment is split into overlapping windows of at most `target_chars`
//! characters with `overlap_chars` of trailing text carried into the next
//! window. Windows never split mid-word.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text for
//! staleness detection in the embedding pipeline.
//!
//! # Guarantees
//!
//! - Given identical input text and configuration, chunk boundaries and
//!   text are reproducible byte-for-byte.
//! - A segment shorter than `target_chars` yields exactly one chunk.
//! - An empty segment yields zero chunks (not an error).
//! - Chunk indices are contiguous per segment: `0, 1, 2, …`, restarting
//!   for every lesson.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{CourseChunk, Lesson};

/// One lesson's worth of body text (or the course preamble).
#[derive(Debug)]
struct Segment<'a> {
    lesson_number: Option<i64>,
    text: &'a str,
}

/// Split a course document into provenance-tagged chunks.
///
/// `lessons` must be in document order; a lesson whose `Lesson N:` marker
/// does not appear in the text simply produces no chunks.
pub fn build_course_chunks(
    course_title: &str,
    lessons: &[Lesson],
    text: &str,
    target_chars: usize,
    overlap_chars: usize,
) -> Vec<CourseChunk> {
    let mut chunks = Vec::new();

    for segment in segment_lessons(text, lessons) {
        for (i, window) in split_overlapping_windows(segment.text, target_chars, overlap_chars)
            .into_iter()
            .enumerate()
        {
            chunks.push(make_chunk(
                course_title,
                segment.lesson_number,
                i as i64,
                &window,
            ));
        }
    }

    chunks
}

/// Split plain text into word-boundary-respecting overlapping windows.
///
/// Words are whitespace-separated tokens; each window is the longest run
/// of words whose joined length stays within `target_chars` (a single
/// oversized word is kept whole). The next window starts with the longest
/// suffix of the previous window's words that fits in `overlap_chars`, so
/// no semantic boundary is silently lost.
pub fn split_overlapping_windows(
    text: &str,
    target_chars: usize,
    overlap_chars: usize,
) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = start;
        let mut len = 0usize;
        while end < words.len() {
            let added = if len == 0 {
                words[end].len()
            } else {
                words[end].len() + 1
            };
            if len + added > target_chars && len > 0 {
                break;
            }
            len += added;
            end += 1;
        }

        windows.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }

        let overlap_start = overlap_suffix_start(&words[start..end], overlap_chars);
        let next = start + overlap_start;
        // Must always advance, even when the overlap would cover the
        // whole window (e.g. overlap_chars >= target_chars).
        start = if next == start { end } else { next };
    }

    windows
}

/// Index (within `words`) where the trailing overlap region begins: the
/// longest suffix whose joined length fits in `overlap_chars`.
fn overlap_suffix_start(words: &[&str], overlap_chars: usize) -> usize {
    let mut start = words.len();
    let mut len = 0usize;
    while start > 0 {
        let added = if len == 0 {
            words[start - 1].len()
        } else {
            words[start - 1].len() + 1
        };
        if len + added > overlap_chars {
            break;
        }
        len += added;
        start -= 1;
    }
    start
}

/// Locate lesson markers and carve the document into segments.
fn segment_lessons<'a>(text: &'a str, lessons: &[Lesson]) -> Vec<Segment<'a>> {
    // (marker_start, body_start, lesson_number), in document order.
    let mut marks: Vec<(usize, usize, i64)> = Vec::new();
    let mut from = 0usize;

    for lesson in lessons {
        let marker = format!("Lesson {}:", lesson.number);
        if let Some(pos) = find_at_line_start(text, &marker, from) {
            let body_start = text[pos..]
                .find('\n')
                .map(|i| pos + i + 1)
                .unwrap_or(text.len());
            marks.push((pos, body_start, lesson.number));
            from = body_start;
        }
    }

    let mut segments = Vec::new();

    let preamble_end = marks.first().map(|m| m.0).unwrap_or(text.len());
    segments.push(Segment {
        lesson_number: None,
        text: &text[..preamble_end],
    });

    for (i, &(_, body_start, number)) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map(|m| m.0).unwrap_or(text.len());
        segments.push(Segment {
            lesson_number: Some(number),
            text: strip_lesson_link_line(&text[body_start..end]),
        });
    }

    segments
}

/// Find `marker` at the start of a line, searching forward from `from`.
fn find_at_line_start(text: &str, marker: &str, from: usize) -> Option<usize> {
    let mut search_from = from;
    while let Some(rel) = text[search_from..].find(marker) {
        let pos = search_from + rel;
        if pos == 0 || text.as_bytes()[pos - 1] == b'\n' {
            return Some(pos);
        }
        search_from = pos + marker.len();
    }
    None
}

/// Drop a `Lesson Link:` line immediately following a lesson marker.
///
/// The link is lesson metadata (already captured during parsing), not
/// lesson content.
fn strip_lesson_link_line(body: &str) -> &str {
    let first_line_end = body.find('\n').map(|i| i + 1).unwrap_or(body.len());
    if body[..first_line_end].trim_start().starts_with("Lesson Link:") {
        &body[first_line_end..]
    } else {
        body
    }
}

/// Create a single [`CourseChunk`] with a UUID and SHA-256 content hash.
fn make_chunk(
    course_title: &str,
    lesson_number: Option<i64>,
    chunk_index: i64,
    text: &str,
) -> CourseChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    CourseChunk {
        id: Uuid::new_v4().to_string(),
        course_title: course_title.to_string(),
        lesson_number,
        chunk_index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(number: i64, title: &str) -> Lesson {
        Lesson {
            number,
            title: title.to_string(),
            link: None,
        }
    }

    fn sentence_soup(n: usize) -> String {
        (0..n)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_single_window() {
        let windows = split_overlapping_windows("just a few words here", 800, 100);
        assert_eq!(windows, vec!["just a few words here".to_string()]);
    }

    #[test]
    fn test_empty_text_no_windows() {
        assert!(split_overlapping_windows("", 800, 100).is_empty());
        assert!(split_overlapping_windows("   \n\n  ", 800, 100).is_empty());
    }

    #[test]
    fn test_windows_respect_target_size() {
        let text = sentence_soup(60);
        let windows = split_overlapping_windows(&text, 120, 30);
        assert!(windows.len() > 1);
        for w in &windows {
            // A window may exceed the target only for a single oversized
            // word, which this input does not contain.
            assert!(w.len() <= 120, "window too long: {} chars", w.len());
        }
    }

    #[test]
    fn test_windows_never_split_words() {
        let text = sentence_soup(40);
        let original: Vec<&str> = text.split_whitespace().collect();
        let windows = split_overlapping_windows(&text, 100, 25);
        for w in &windows {
            for word in w.split_whitespace() {
                assert!(
                    original.contains(&word),
                    "word '{}' not present in source text",
                    word
                );
            }
        }
    }

    #[test]
    fn test_adjacent_windows_overlap() {
        let text = sentence_soup(50);
        let windows = split_overlapping_windows(&text, 150, 40);
        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let prev_words: Vec<&str> = pair[0].split_whitespace().collect();
            let start = overlap_suffix_start(&prev_words, 40);
            let expected = prev_words[start..].join(" ");
            assert!(
                pair[1].starts_with(&expected),
                "next window does not start with previous tail: {:?} vs {:?}",
                expected,
                &pair[1]
            );
        }
    }

    #[test]
    fn test_oversized_word_kept_whole() {
        let long_word = "x".repeat(50);
        let text = format!("{} short tail", long_word);
        let windows = split_overlapping_windows(&text, 20, 5);
        assert_eq!(windows[0], long_word);
    }

    #[test]
    fn test_overlap_larger_than_target_still_terminates() {
        let text = sentence_soup(20);
        let windows = split_overlapping_windows(&text, 50, 500);
        assert!(!windows.is_empty());
        let joined_words: usize = windows.iter().map(|w| w.split_whitespace().count()).sum();
        assert!(joined_words >= text.split_whitespace().count());
    }

    #[test]
    fn test_preamble_tagged_without_lesson() {
        let text = "About this course.\n\nLesson 0: Welcome\nHello there students.";
        let chunks = build_course_chunks("C", &[lesson(0, "Welcome")], text, 800, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].lesson_number, None);
        assert_eq!(chunks[0].text, "About this course.");
        assert_eq!(chunks[1].lesson_number, Some(0));
        assert_eq!(chunks[1].text, "Hello there students.");
    }

    #[test]
    fn test_chunk_index_restarts_per_lesson() {
        let body_a = sentence_soup(30);
        let body_b = sentence_soup(30);
        let text = format!(
            "Lesson 1: Alpha\n{}\nLesson 2: Beta\n{}",
            body_a, body_b
        );
        let chunks = build_course_chunks(
            "C",
            &[lesson(1, "Alpha"), lesson(2, "Beta")],
            &text,
            200,
            40,
        );

        let lesson1: Vec<_> = chunks
            .iter()
            .filter(|c| c.lesson_number == Some(1))
            .collect();
        let lesson2: Vec<_> = chunks
            .iter()
            .filter(|c| c.lesson_number == Some(2))
            .collect();
        assert!(lesson1.len() > 1);
        assert!(lesson2.len() > 1);
        for (i, c) in lesson1.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
        for (i, c) in lesson2.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn test_empty_lesson_yields_no_chunks() {
        let text = "Lesson 1: Ghost\nLesson 2: Real\nActual content lives here.";
        let chunks = build_course_chunks(
            "C",
            &[lesson(1, "Ghost"), lesson(2, "Real")],
            text,
            800,
            100,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, Some(2));
    }

    #[test]
    fn test_lesson_link_line_excluded_from_content() {
        let text = "Lesson 1: Alpha\nLesson Link: https://example.com/1\nReal lesson body.";
        let chunks = build_course_chunks("C", &[lesson(1, "Alpha")], text, 800, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Real lesson body.");
    }

    #[test]
    fn test_marker_mid_line_not_matched() {
        let text = "This mentions Lesson 1: casually mid-sentence.\nLesson 1: Alpha\nBody.";
        let chunks = build_course_chunks("C", &[lesson(1, "Alpha")], text, 800, 100);
        let preamble = &chunks[0];
        assert_eq!(preamble.lesson_number, None);
        assert!(preamble.text.contains("casually"));
        assert_eq!(chunks[1].text, "Body.");
    }

    #[test]
    fn test_deterministic_boundaries() {
        let text = format!("Intro text.\n\nLesson 1: Alpha\n{}", sentence_soup(40));
        let lessons = [lesson(1, "Alpha")];
        let a = build_course_chunks("C", &lessons, &text, 150, 30);
        let b = build_course_chunks("C", &lessons, &text, 150, 30);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.lesson_number, y.lesson_number);
            assert_eq!(x.chunk_index, y.chunk_index);
        }
    }

    #[test]
    fn test_missing_marker_skips_lesson() {
        let text = "Lesson 2: Present\nContent here.";
        let chunks = build_course_chunks(
            "C",
            &[lesson(1, "Absent"), lesson(2, "Present")],
            text,
            800,
            100,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, Some(2));
    }
}
