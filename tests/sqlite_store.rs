//! SQLite store behavior against a real database file.

use std::sync::Arc;

use lectern::db;
use lectern::sqlite_store::SqliteStore;
use lectern_core::models::{Course, CourseChunk, Lesson};
use lectern_core::store::{ContentFilter, CourseStore};

fn course(title: &str) -> Course {
    Course {
        title: title.to_string(),
        link: Some(format!("https://example.com/{}", title)),
        instructor: Some("Ada Lovelace".to_string()),
        lessons: vec![
            Lesson {
                number: 1,
                title: "One".to_string(),
                link: Some(format!("https://example.com/{}/1", title)),
            },
            Lesson {
                number: 2,
                title: "Two".to_string(),
                link: None,
            },
        ],
    }
}

fn chunk(title: &str, lesson: Option<i64>, index: i64, text: &str) -> CourseChunk {
    CourseChunk {
        id: format!("{}-{:?}-{}", title, lesson, index),
        course_title: title.to_string(),
        lesson_number: lesson,
        chunk_index: index,
        text: text.to_string(),
        hash: format!("hash-{}", index),
    }
}

async fn open_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    let path = dir.path().join("lectern.sqlite");
    let pool = db::connect(&path).await.unwrap();
    db::init_schema(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

#[tokio::test]
async fn test_course_roundtrip() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .upsert_course(&course("Intro to X"), &[1.0, 0.0])
        .await
        .unwrap();

    let loaded = store.get_course("intro to x").await.unwrap().unwrap();
    assert_eq!(loaded.title, "Intro to X");
    assert_eq!(loaded.instructor.as_deref(), Some("Ada Lovelace"));
    assert_eq!(loaded.lessons.len(), 2);
    assert_eq!(
        store.lesson_link("Intro to X", 1).await.unwrap().as_deref(),
        Some("https://example.com/Intro to X/1")
    );
    assert!(store.lesson_link("Intro to X", 2).await.unwrap().is_none());
    assert!(store.get_course("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_catalog_upsert_replaces() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .upsert_course(&course("Intro to X"), &[1.0, 0.0])
        .await
        .unwrap();
    store
        .upsert_course(&course("INTRO TO X"), &[0.0, 1.0])
        .await
        .unwrap();

    let titles = store.course_titles().await.unwrap();
    assert_eq!(titles.len(), 1);

    let matches = store.catalog_search(&[0.0, 1.0], 5).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert!((matches[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_reingest_leaves_no_stale_chunks() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let old: Vec<CourseChunk> = (0..3)
        .map(|i| chunk("Intro to X", Some(1), i, &format!("old {}", i)))
        .collect();
    store
        .replace_chunks("Intro to X", &old, &vec![vec![1.0, 0.0]; 3])
        .await
        .unwrap();
    assert_eq!(store.chunk_count().await.unwrap(), 3);

    let new = vec![chunk("Intro to X", Some(1), 0, "fresh")];
    store
        .replace_chunks("Intro to X", &new, &[vec![1.0, 0.0]])
        .await
        .unwrap();

    assert_eq!(store.chunk_count().await.unwrap(), 1);
    let hits = store
        .content_search(&[1.0, 0.0], &ContentFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.text, "fresh");
}

#[tokio::test]
async fn test_content_search_filters_and_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let x_chunks = vec![
        chunk("Intro to X", None, 0, "preamble"),
        chunk("Intro to X", Some(1), 0, "x lesson one"),
        chunk("Intro to X", Some(2), 0, "x lesson two"),
    ];
    // Distinct directions so similarity ordering is observable.
    let x_vectors = vec![
        vec![1.0, 0.0],
        vec![0.7, 0.7],
        vec![0.0, 1.0],
    ];
    store
        .replace_chunks("Intro to X", &x_chunks, &x_vectors)
        .await
        .unwrap();

    let y_chunks = vec![chunk("Course Y", Some(1), 0, "y lesson one")];
    store
        .replace_chunks("Course Y", &y_chunks, &[vec![0.0, 1.0]])
        .await
        .unwrap();

    // Unfiltered: ordered by descending similarity to [0, 1].
    let hits = store
        .content_search(&[0.0, 1.0], &ContentFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].chunk.text, "x lesson two");
    // Equal-similarity tie ("Course Y" vs "x lesson two") keeps
    // ingestion order: the X chunk was written first.
    assert_eq!(hits[1].chunk.text, "y lesson one");

    // Course filter, case-insensitive.
    let filter = ContentFilter {
        course_title: Some("intro to x".to_string()),
        lesson_number: None,
    };
    let hits = store.content_search(&[0.0, 1.0], &filter, 10).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.chunk.course_title == "Intro to X"));

    // Lesson filter.
    let filter = ContentFilter {
        course_title: Some("Intro to X".to_string()),
        lesson_number: Some(2),
    };
    let hits = store.content_search(&[0.0, 1.0], &filter, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.lesson_number, Some(2));

    // Limit respected.
    let hits = store
        .content_search(&[0.0, 1.0], &ContentFilter::default(), 2)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
}
