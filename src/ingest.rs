//! Course-document parsing and folder ingestion.
//!
//! Course documents are plain UTF-8 text with a metadata header and
//! lesson markers:
//!
//! ```text
//! Course Title: Building Things with X
//! Course Link: https://example.com/course
//! Course Instructor: Ada Lovelace
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/course/lesson-0
//! Welcome to the course…
//!
//! Lesson 1: Fundamentals
//! …
//! ```
//!
//! `Course Title:` is required; everything else is optional. Parsing of
//! other document formats (PDF, HTML, …) into this plain-text shape is an
//! external concern.
//!
//! A folder sync walks `*.txt` and `*.md` files, parses each, and indexes
//! the result. Documents that fail to parse are logged and skipped —
//! ingestion continues for the remaining files. Courses already present
//! in the index are skipped unless a full re-sync is requested.

use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use lectern_core::models::{normalize_title, Course, Lesson};

use crate::error::IngestError;
use crate::index::CourseIndex;

/// A parsed course document: the catalog metadata plus the body text the
/// chunker runs over (header lines removed, lesson markers kept).
#[derive(Debug)]
pub struct ParsedCourse {
    pub course: Course,
    pub body: String,
}

/// Outcome of a folder sync.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_seen: usize,
    pub courses_added: usize,
    pub chunks_added: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Parse one course document.
pub fn parse_course_document(text: &str) -> Result<ParsedCourse, IngestError> {
    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    let mut title = None;
    let mut link = None;
    let mut instructor = None;

    // The header is the leading run of metadata lines; the body starts at
    // the first line that is neither metadata nor blank.
    let mut body_offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("Course Title:") {
            title = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("Course Link:") {
            link = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("Course Instructor:") {
            instructor = Some(value.trim().to_string());
        } else if !trimmed.is_empty() {
            break;
        }
        body_offset += line.len();
    }

    let title = title.filter(|t| !t.is_empty()).ok_or(IngestError::MissingTitle)?;
    let body = text[body_offset..].to_string();
    let lessons = parse_lessons(&body);

    Ok(ParsedCourse {
        course: Course {
            title,
            link,
            instructor,
            lessons,
        },
        body,
    })
}

/// Collect `Lesson N: Title` markers (with an optional `Lesson Link:` on
/// the following line) in document order.
fn parse_lessons(body: &str) -> Vec<Lesson> {
    let mut lessons: Vec<Lesson> = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((number, title)) = parse_lesson_marker(line) else {
            continue;
        };
        let link = lines
            .peek()
            .and_then(|next| next.trim().strip_prefix("Lesson Link:"))
            .map(|value| value.trim().to_string());
        if link.is_some() {
            lines.next();
        }
        // First marker wins for a duplicated lesson number.
        if !lessons.iter().any(|l| l.number == number) {
            lessons.push(Lesson {
                number,
                title,
                link,
            });
        }
    }

    lessons
}

/// Parse `Lesson N: Title` at the start of a line.
fn parse_lesson_marker(line: &str) -> Option<(i64, String)> {
    let rest = line.strip_prefix("Lesson ")?;
    let colon = rest.find(':')?;
    let number: i64 = rest[..colon].trim().parse().ok()?;
    let title = rest[colon + 1..].trim().to_string();
    Some((number, title))
}

fn document_globs() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new("**/*.txt")?);
    builder.add(Glob::new("**/*.md")?);
    Ok(builder.build()?)
}

/// Walk `folder` and index every parseable course document.
///
/// With `full = false`, documents whose course title is already indexed
/// are skipped (startup-time incremental loading); with `full = true`,
/// every document is re-ingested and supersedes its previous version.
pub async fn sync_folder(
    index: &CourseIndex,
    folder: &Path,
    full: bool,
) -> Result<IngestReport> {
    let globs = document_globs()?;
    let existing: Vec<String> = index
        .course_titles()
        .await?
        .iter()
        .map(|t| normalize_title(t))
        .collect();

    let mut report = IngestReport::default();

    for entry in WalkDir::new(folder).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() || !globs.is_match(entry.path()) {
            continue;
        }
        report.files_seen += 1;

        let text = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;

        let parsed = match parse_course_document(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %entry.path().display(), %err, "skipping document");
                report.failed += 1;
                continue;
            }
        };

        if !full && existing.contains(&normalize_title(&parsed.course.title)) {
            report.skipped_existing += 1;
            continue;
        }

        let chunks = index.add_course(&parsed.course, &parsed.body).await?;
        info!(course = %parsed.course.title, chunks, "course ingested");
        report.courses_added += 1;
        report.chunks_added += chunks;
    }

    Ok(report)
}
