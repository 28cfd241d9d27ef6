//! Storage abstraction for Lectern's two vector collections.
//!
//! The [`CourseStore`] trait defines the operations the retrieval pipeline
//! needs against the *catalog* collection (one record per course, used to
//! resolve fuzzy course-name references) and the *content* collection (one
//! record per chunk, used for semantic search). Backends are pluggable:
//! this crate ships an in-memory implementation, the app crate adds a
//! SQLite one.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must preserve ingestion order within each collection — the ranking
//! tie-break depends on it.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Course, CourseChunk};

/// Metadata filters for a content search.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    /// Restrict to chunks of this canonical course title.
    pub course_title: Option<String>,
    /// Restrict to chunks of this lesson number.
    pub lesson_number: Option<i64>,
}

/// A catalog record matched during course-name resolution.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    /// Canonical course title.
    pub title: String,
    /// Cosine similarity of the query to the catalog embedding.
    pub similarity: f32,
}

/// A content record matched during semantic search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: CourseChunk,
    pub similarity: f32,
}

/// Abstract storage backend over the catalog and content collections.
///
/// | Method | Collection | Purpose |
/// |--------|-----------|---------|
/// | [`upsert_course`](CourseStore::upsert_course) | catalog | write/replace a course record |
/// | [`replace_chunks`](CourseStore::replace_chunks) | content | replace all chunks for a title |
/// | [`catalog_search`](CourseStore::catalog_search) | catalog | nearest courses by title embedding |
/// | [`content_search`](CourseStore::content_search) | content | nearest chunks, metadata-filtered |
/// | [`get_course`](CourseStore::get_course) | catalog | full course record by title |
/// | [`lesson_link`](CourseStore::lesson_link) | catalog | link for one lesson of a course |
/// | [`course_titles`](CourseStore::course_titles) | catalog | all canonical titles, ingestion order |
/// | [`chunk_count`](CourseStore::chunk_count) | content | total stored chunks |
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Write or replace the catalog record for a course.
    ///
    /// `title_vector` is the embedding of [`Course::catalog_text`].
    /// Matching on the title is case-insensitive.
    async fn upsert_course(&self, course: &Course, title_vector: &[f32]) -> Result<()>;

    /// Replace all content records for a course title with a new set.
    ///
    /// Removes every prior chunk for the title before writing, so
    /// re-ingestion never accumulates duplicates. `vectors` must be
    /// parallel to `chunks`.
    async fn replace_chunks(
        &self,
        course_title: &str,
        chunks: &[CourseChunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// Nearest catalog records by cosine similarity, descending, up to
    /// `limit`. Ties preserve ingestion order.
    async fn catalog_search(&self, query_vector: &[f32], limit: usize)
        -> Result<Vec<CatalogMatch>>;

    /// Nearest content records matching `filter`, by cosine similarity,
    /// descending, up to `limit`. Ties preserve ingestion order.
    async fn content_search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Full course record by canonical title (case-insensitive).
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// Link for one lesson of a course, if known.
    async fn lesson_link(&self, title: &str, lesson_number: i64) -> Result<Option<String>>;

    /// All canonical course titles, in ingestion order.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Total number of stored content records.
    async fn chunk_count(&self) -> Result<usize>;
}
