//! Course index: the write and query surface over the two vector
//! collections.
//!
//! [`CourseIndex`] owns the embedder and the store, and enforces the data
//! invariants the tools rely on:
//!
//! - Ingesting a course replaces its catalog record and the full chunk
//!   set for its title, under a per-title exclusive section — a search
//!   never observes a half-replaced course, and ingestion of one title
//!   does not block searches or ingestion of others.
//! - Course-name resolution is a catalog nearest-neighbor lookup gated by
//!   the configured similarity threshold; a miss is `None`, not an error.
//! - Embedding or store failures surface as
//!   [`RetrievalError::Unavailable`], never as an empty result set.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use lectern_core::chunk::build_course_chunks;
use lectern_core::embedding::Embedder;
use lectern_core::models::{normalize_title, Course};
use lectern_core::store::{ContentFilter, CourseStore, SearchHit};

use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::error::RetrievalError;

pub struct CourseIndex {
    store: Arc<dyn CourseStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    /// One lock per course title, so re-ingestion holds an exclusive
    /// section for that title only.
    ingest_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CourseIndex {
    pub fn new(
        store: Arc<dyn CourseStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            retrieval,
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn title_lock(&self, title: &str) -> Arc<Mutex<()>> {
        let mut locks = self.ingest_locks.lock().await;
        locks
            .entry(normalize_title(title))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Chunk, embed, and store a course document.
    ///
    /// Supersedes any previously ingested course with the same title.
    /// Returns the number of chunks written.
    pub async fn add_course(&self, course: &Course, document_text: &str) -> Result<usize> {
        let chunks = build_course_chunks(
            &course.title,
            &course.lessons,
            document_text,
            self.chunking.target_chars,
            self.chunking.overlap_chars,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        let title_vector = self
            .embedder
            .embed(&[course.catalog_text()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response for course title"))?;

        let lock = self.title_lock(&course.title).await;
        let _guard = lock.lock().await;

        self.store.upsert_course(course, &title_vector).await?;
        self.store
            .replace_chunks(&course.title, &chunks, &vectors)
            .await?;

        debug!(course = %course.title, chunks = chunks.len(), "course indexed");
        Ok(chunks.len())
    }

    /// Resolve a fuzzy, user-typed course name to a canonical title.
    ///
    /// Returns `None` when the best catalog match falls below the
    /// configured similarity threshold — callers treat this as "no course
    /// filter could be resolved", not as a failure.
    pub async fn resolve_course_title(
        &self,
        name: &str,
    ) -> Result<Option<String>, RetrievalError> {
        let query = normalize_title(name);
        let query_vector = self
            .embedder
            .embed(&[query])
            .await
            .map_err(unavailable)?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Unavailable("empty embedding response".into()))?;

        let matches = self
            .store
            .catalog_search(&query_vector, 1)
            .await
            .map_err(unavailable)?;

        Ok(matches
            .into_iter()
            .next()
            .filter(|m| m.similarity >= self.retrieval.course_match_threshold)
            .map(|m| {
                debug!(query = %name, resolved = %m.title, similarity = m.similarity, "course resolved");
                m.title
            }))
    }

    /// Semantic content search, optionally restricted to a course title
    /// and/or lesson number. Results are capped at the configured maximum
    /// and ordered by descending similarity (ties in ingestion order).
    pub async fn search(
        &self,
        query: &str,
        course_title: Option<&str>,
        lesson_number: Option<i64>,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(unavailable)?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Unavailable("empty embedding response".into()))?;

        let filter = ContentFilter {
            course_title: course_title.map(str::to_string),
            lesson_number,
        };

        self.store
            .content_search(&query_vector, &filter, self.retrieval.max_results)
            .await
            .map_err(unavailable)
    }

    /// Full course record by canonical title.
    pub async fn course(&self, title: &str) -> Result<Option<Course>, RetrievalError> {
        self.store.get_course(title).await.map_err(unavailable)
    }

    /// Link for one lesson of a course, if known.
    pub async fn lesson_link(
        &self,
        title: &str,
        lesson_number: i64,
    ) -> Result<Option<String>, RetrievalError> {
        self.store
            .lesson_link(title, lesson_number)
            .await
            .map_err(unavailable)
    }

    /// All indexed course titles, in ingestion order.
    pub async fn course_titles(&self) -> Result<Vec<String>> {
        self.store.course_titles().await
    }

    /// Total number of indexed chunks.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.chunk_count().await
    }
}

fn unavailable(err: anyhow::Error) -> RetrievalError {
    RetrievalError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use lectern_core::models::Lesson;
    use lectern_core::store::memory::InMemoryStore;

    /// Deterministic embedder: projects text onto a fixed keyword axis
    /// per dimension, so related texts land near each other.
    struct KeywordEmbedder {
        axes: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                axes: vec!["rust", "python", "cooking", "intro"],
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-test"
        }
        fn dims(&self) -> usize {
            self.axes.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.axes
                        .iter()
                        .map(|axis| lower.matches(axis).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("backend is down")
        }
    }

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            link: None,
            instructor: None,
            lessons: vec![Lesson {
                number: 1,
                title: "One".to_string(),
                link: None,
            }],
        }
    }

    fn make_index(embedder: Arc<dyn Embedder>) -> CourseIndex {
        CourseIndex::new(
            Arc::new(InMemoryStore::new()),
            embedder,
            ChunkingConfig::default(),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_resolve_exact_title() {
        let index = make_index(Arc::new(KeywordEmbedder::new()));
        index
            .add_course(&course("Intro to Rust"), "Lesson 1: One\nrust rust rust")
            .await
            .unwrap();

        let resolved = index.resolve_course_title("intro to rust").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("Intro to Rust"));
    }

    #[tokio::test]
    async fn test_resolve_unrelated_query_is_none() {
        let index = make_index(Arc::new(KeywordEmbedder::new()));
        index
            .add_course(&course("Intro to Rust"), "Lesson 1: One\nrust rust rust")
            .await
            .unwrap();

        // Shares no keyword axis with the catalog record.
        let resolved = index.resolve_course_title("cooking").await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_reingest_supersedes_chunks() {
        let index = make_index(Arc::new(KeywordEmbedder::new()));
        index
            .add_course(
                &course("Intro to Rust"),
                "Lesson 1: One\nrust ownership rust borrowing rust lifetimes",
            )
            .await
            .unwrap();
        let first_count = index.chunk_count().await.unwrap();
        assert!(first_count >= 1);

        index
            .add_course(&course("Intro to Rust"), "Lesson 1: One\nrust rewritten")
            .await
            .unwrap();

        assert_eq!(index.chunk_count().await.unwrap(), 1);
        let hits = index.search("rust", None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.text.contains("rewritten"));
    }

    #[tokio::test]
    async fn test_search_respects_lesson_filter() {
        let index = make_index(Arc::new(KeywordEmbedder::new()));
        let mut c = course("Intro to Rust");
        c.lessons.push(Lesson {
            number: 2,
            title: "Two".to_string(),
            link: None,
        });
        index
            .add_course(
                &c,
                "Lesson 1: One\nrust basics here\nLesson 2: Two\nrust advanced here",
            )
            .await
            .unwrap();

        let hits = index
            .search("rust", Some("Intro to Rust"), Some(2))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.lesson_number, Some(2));
    }

    #[tokio::test]
    async fn test_embedder_failure_is_unavailable() {
        let index = make_index(Arc::new(FailingEmbedder));
        let err = index.search("anything", None, None).await.unwrap_err();
        let RetrievalError::Unavailable(msg) = err;
        assert!(msg.contains("backend is down"));
    }
}
