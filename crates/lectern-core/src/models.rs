//! Core data models used throughout Lectern.
//!
//! These types represent the courses, lessons, chunks, and conversation
//! turns that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A single lesson within a course, as parsed from the source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub number: i64,
    pub title: String,
    pub link: Option<String>,
}

/// A course and its ordered lesson list.
///
/// The title is the identity: matching is case-insensitive, and
/// re-ingesting a document with the same title supersedes the previous
/// catalog record and all of its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Look up the link for a lesson by number.
    pub fn lesson_link(&self, number: i64) -> Option<&str> {
        self.lessons
            .iter()
            .find(|l| l.number == number)
            .and_then(|l| l.link.as_deref())
    }

    /// The normalized text a catalog record is embedded over.
    ///
    /// Lowercased, whitespace-collapsed title plus the instructor when
    /// present, so a fuzzy user-typed course name lands near the record.
    pub fn catalog_text(&self) -> String {
        let mut text = normalize_title(&self.title);
        if let Some(instructor) = &self.instructor {
            text.push(' ');
            text.push_str(&normalize_title(instructor));
        }
        text
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One retrievable slice of course text with its provenance.
///
/// `lesson_number` is `None` for text preceding the first lesson marker
/// (course-level preamble). `chunk_index` restarts at 0 for every lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseChunk {
    pub id: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of the chunk text, for staleness detection.
    pub hash: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An ordered (role, text) pair in a conversation's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// Provenance attached to an answer: which course and lesson a retrieved
/// chunk came from, with the lesson link when one is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub link: Option<String>,
}

impl SourceRef {
    /// Human-readable label, e.g. `"Intro to X - Lesson 2"`.
    pub fn label(&self) -> String {
        match self.lesson_number {
            Some(n) => format!("{} - Lesson {}", self.course_title, n),
            None => self.course_title.clone(),
        }
    }
}
