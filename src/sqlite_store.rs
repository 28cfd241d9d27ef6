//! SQLite-backed [`CourseStore`] implementation.
//!
//! Catalog records live in `courses` (one row per course, lesson list as
//! JSON, title embedding as a little-endian f32 BLOB). Content records
//! live in `chunks`, whose autoincrement `seq` preserves global ingestion
//! order. Similarity is computed in Rust over candidate rows, so search
//! behavior is identical to the in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use lectern_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use lectern_core::models::{normalize_title, Course, CourseChunk, Lesson};
use lectern_core::rank::top_k_by_similarity;
use lectern_core::store::{CatalogMatch, ContentFilter, CourseStore, SearchHit};

/// SQLite implementation of the [`CourseStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    let lessons_json: String = row.try_get("lessons_json")?;
    let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)?;
    Ok(Course {
        title: row.try_get("title")?,
        link: row.try_get("link")?,
        instructor: row.try_get("instructor")?,
        lessons,
    })
}

#[async_trait]
impl CourseStore for SqliteStore {
    async fn upsert_course(&self, course: &Course, title_vector: &[f32]) -> Result<()> {
        let lessons_json = serde_json::to_string(&course.lessons)?;
        sqlx::query(
            r#"
            INSERT INTO courses (title, title_key, link, instructor, lessons_json, embedding, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title_key) DO UPDATE SET
                title = excluded.title,
                link = excluded.link,
                instructor = excluded.instructor,
                lessons_json = excluded.lessons_json,
                embedding = excluded.embedding,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&course.title)
        .bind(normalize_title(&course.title))
        .bind(&course.link)
        .bind(&course.instructor)
        .bind(&lessons_json)
        .bind(vec_to_blob(title_vector))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

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

        let title_key = normalize_title(course_title);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE title_key = ?")
            .bind(&title_key)
            .execute(&mut *tx)
            .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, course_title, title_key, lesson_number, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.course_title)
            .bind(&title_key)
            .bind(chunk.lesson_number)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn catalog_search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogMatch>> {
        let rows = sqlx::query("SELECT title, embedding FROM courses ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let matches: Vec<CatalogMatch> = rows
            .iter()
            .map(|row| -> Result<CatalogMatch> {
                let blob: Vec<u8> = row.try_get("embedding")?;
                Ok(CatalogMatch {
                    title: row.try_get("title")?,
                    similarity: cosine_similarity(query_vector, &blob_to_vec(&blob)),
                })
            })
            .collect::<Result<_>>()?;

        Ok(top_k_by_similarity(matches, limit, |m| m.similarity))
    }

    async fn content_search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut sql = String::from(
            "SELECT id, course_title, lesson_number, chunk_index, text, hash, embedding FROM chunks",
        );
        let mut clauses: Vec<&str> = Vec::new();
        if filter.course_title.is_some() {
            clauses.push("title_key = ?");
        }
        if filter.lesson_number.is_some() {
            clauses.push("lesson_number = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY seq");

        let mut query = sqlx::query(&sql);
        if let Some(title) = &filter.course_title {
            query = query.bind(normalize_title(title));
        }
        if let Some(lesson) = filter.lesson_number {
            query = query.bind(lesson);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| -> Result<SearchHit> {
                let blob: Vec<u8> = row.try_get("embedding")?;
                Ok(SearchHit {
                    chunk: CourseChunk {
                        id: row.try_get("id")?,
                        course_title: row.try_get("course_title")?,
                        lesson_number: row.try_get("lesson_number")?,
                        chunk_index: row.try_get("chunk_index")?,
                        text: row.try_get("text")?,
                        hash: row.try_get("hash")?,
                    },
                    similarity: cosine_similarity(query_vector, &blob_to_vec(&blob)),
                })
            })
            .collect::<Result<_>>()?;

        Ok(top_k_by_similarity(hits, limit, |h| h.similarity))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let row = sqlx::query(
            "SELECT title, link, instructor, lessons_json FROM courses WHERE title_key = ?",
        )
        .bind(normalize_title(title))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_course).transpose()
    }

    async fn lesson_link(&self, title: &str, lesson_number: i64) -> Result<Option<String>> {
        Ok(self
            .get_course(title)
            .await?
            .and_then(|c| c.lesson_link(lesson_number).map(str::to_string)))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT title FROM courses ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("title").map_err(Into::into))
            .collect()
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
