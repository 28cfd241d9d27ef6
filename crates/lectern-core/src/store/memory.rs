//! In-memory [`CourseStore`] implementation for tests and small corpora.
//!
//! Uses `Vec`s behind `std::sync::RwLock` so ingestion order is preserved
//! for both collections. Vector search is brute-force cosine similarity
//! over all stored vectors.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{normalize_title, Course, CourseChunk};
use crate::rank::top_k_by_similarity;

use super::{CatalogMatch, ContentFilter, CourseStore, SearchHit};

struct CatalogEntry {
    course: Course,
    vector: Vec<f32>,
}

struct ContentEntry {
    chunk: CourseChunk,
    vector: Vec<f32>,
}

/// In-memory store for testing and in-process corpora.
#[derive(Default)]
pub struct InMemoryStore {
    catalog: RwLock<Vec<CatalogEntry>>,
    content: RwLock<Vec<ContentEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for InMemoryStore {
    async fn upsert_course(&self, course: &Course, title_vector: &[f32]) -> Result<()> {
        let key = normalize_title(&course.title);
        let mut catalog = self.catalog.write().unwrap();
        catalog.retain(|e| normalize_title(&e.course.title) != key);
        catalog.push(CatalogEntry {
            course: course.clone(),
            vector: title_vector.to_vec(),
        });
        Ok(())
    }

    async fn replace_chunks(
        &self,
        course_title: &str,
        chunks: &[CourseChunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );
        let key = normalize_title(course_title);
        let mut content = self.content.write().unwrap();
        content.retain(|e| normalize_title(&e.chunk.course_title) != key);
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            content.push(ContentEntry {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn catalog_search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogMatch>> {
        let catalog = self.catalog.read().unwrap();
        let matches: Vec<CatalogMatch> = catalog
            .iter()
            .map(|e| CatalogMatch {
                title: e.course.title.clone(),
                similarity: cosine_similarity(query_vector, &e.vector),
            })
            .collect();
        Ok(top_k_by_similarity(matches, limit, |m| m.similarity))
    }

    async fn content_search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let title_key = filter.course_title.as_deref().map(normalize_title);
        let content = self.content.read().unwrap();
        let hits: Vec<SearchHit> = content
            .iter()
            .filter(|e| {
                if let Some(key) = &title_key {
                    if normalize_title(&e.chunk.course_title) != *key {
                        return false;
                    }
                }
                if let Some(n) = filter.lesson_number {
                    if e.chunk.lesson_number != Some(n) {
                        return false;
                    }
                }
                true
            })
            .map(|e| SearchHit {
                chunk: e.chunk.clone(),
                similarity: cosine_similarity(query_vector, &e.vector),
            })
            .collect();
        Ok(top_k_by_similarity(hits, limit, |h| h.similarity))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let key = normalize_title(title);
        let catalog = self.catalog.read().unwrap();
        Ok(catalog
            .iter()
            .find(|e| normalize_title(&e.course.title) == key)
            .map(|e| e.course.clone()))
    }

    async fn lesson_link(&self, title: &str, lesson_number: i64) -> Result<Option<String>> {
        Ok(self
            .get_course(title)
            .await?
            .and_then(|c| c.lesson_link(lesson_number).map(str::to_string)))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.iter().map(|e| e.course.title.clone()).collect())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.content.read().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lesson;

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            link: None,
            instructor: None,
            lessons: vec![Lesson {
                number: 1,
                title: "One".to_string(),
                link: Some(format!("https://example.com/{}/1", title)),
            }],
        }
    }

    fn chunk(title: &str, lesson: Option<i64>, index: i64, text: &str) -> CourseChunk {
        CourseChunk {
            id: format!("{}-{:?}-{}", title, lesson, index),
            course_title: title.to_string(),
            lesson_number: lesson,
            chunk_index: index,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_course_replaces_record() {
        let store = InMemoryStore::new();
        store.upsert_course(&course("A"), &[1.0, 0.0]).await.unwrap();
        store.upsert_course(&course("a"), &[0.0, 1.0]).await.unwrap();

        let titles = store.course_titles().await.unwrap();
        assert_eq!(titles.len(), 1);

        let matches = store.catalog_search(&[0.0, 1.0], 10).await.unwrap();
        assert!((matches[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reingest_leaves_no_stale_chunks() {
        let store = InMemoryStore::new();
        let old = vec![
            chunk("A", Some(1), 0, "old zero"),
            chunk("A", Some(1), 1, "old one"),
            chunk("A", Some(1), 2, "old two"),
        ];
        let vectors = vec![vec![1.0, 0.0]; 3];
        store.replace_chunks("A", &old, &vectors).await.unwrap();

        let new = vec![chunk("A", Some(1), 0, "new zero")];
        store
            .replace_chunks("A", &new, &[vec![1.0, 0.0]])
            .await
            .unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 1);
        let hits = store
            .content_search(&[1.0, 0.0], &ContentFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "new zero");
    }

    #[tokio::test]
    async fn test_content_search_filters() {
        let store = InMemoryStore::new();
        let chunks = vec![
            chunk("A", Some(1), 0, "a lesson one"),
            chunk("A", Some(2), 0, "a lesson two"),
            chunk("B", Some(1), 0, "b lesson one"),
        ];
        let vectors = vec![vec![1.0, 0.0]; 3];
        store.replace_chunks("A", &chunks[..2], &vectors[..2]).await.unwrap();
        store.replace_chunks("B", &chunks[2..], &vectors[2..]).await.unwrap();

        let filter = ContentFilter {
            course_title: Some("A".to_string()),
            lesson_number: Some(2),
        };
        let hits = store.content_search(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "a lesson two");

        let filter = ContentFilter {
            course_title: None,
            lesson_number: Some(1),
        };
        let hits = store.content_search(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_content_search_limit_and_tie_order() {
        let store = InMemoryStore::new();
        let chunks: Vec<CourseChunk> = (0..5)
            .map(|i| chunk("A", Some(1), i, &format!("text {}", i)))
            .collect();
        // Identical vectors: every similarity ties, ingestion order wins.
        let vectors = vec![vec![0.5, 0.5]; 5];
        store.replace_chunks("A", &chunks, &vectors).await.unwrap();

        let hits = store
            .content_search(&[0.5, 0.5], &ContentFilter::default(), 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert_eq!(hits[1].chunk.chunk_index, 1);
        assert_eq!(hits[2].chunk.chunk_index, 2);
    }

    #[tokio::test]
    async fn test_lesson_link_lookup() {
        let store = InMemoryStore::new();
        store.upsert_course(&course("A"), &[1.0]).await.unwrap();
        let link = store.lesson_link("a", 1).await.unwrap();
        assert_eq!(link.as_deref(), Some("https://example.com/A/1"));
        assert!(store.lesson_link("A", 99).await.unwrap().is_none());
        assert!(store.lesson_link("missing", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunk_vector_mismatch_rejected() {
        let store = InMemoryStore::new();
        let chunks = vec![chunk("A", None, 0, "x")];
        let result = store.replace_chunks("A", &chunks, &[]).await;
        assert!(result.is_err());
    }
}
