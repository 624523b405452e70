//! Integration tests for the SQLite cache: round trips, prefix scoping,
//! tag filters, dimension checks and on-disk persistence.

use vecdocs::db;
use vecdocs::sqlite_cache::SqliteCache;
use vecdocs::{Cache, Record, StoreError};
use tempfile::TempDir;

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}

fn record(text: &str, embedding: Vec<f32>, record_tags: &[&str]) -> Record {
    Record::new(text, embedding, None, tags(record_tags))
}

/// A 1024-wide vector with `value` in slot `at` and zeros elsewhere.
fn basis(at: usize, value: f32) -> Vec<f32> {
    let mut v = vec![0.0; 1024];
    v[at] = value;
    v
}

#[tokio::test]
async fn test_find_closest_record() {
    let cache = SqliteCache::in_memory("Documents-default-").await.unwrap();
    let foo = Record::new("foo", basis(0, 1.0), Some("test.txt".to_string()), tags(&["test"]));
    let bar = record("bar", basis(1, 1.0), &[]);
    cache.set(&foo.key(), &foo).await.unwrap();
    cache.set(&bar.key(), &bar).await.unwrap();

    let found = cache.find_records(&basis(0, 2.0), None, Some(1)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.text, "foo");
    assert_eq!(found[0].key, foo.key());
    assert!((found[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(found[0].record.source.as_deref(), Some("test.txt"));
    assert_eq!(found[0].record.tags, tags(&["test"]));
}

#[tokio::test]
async fn test_round_trip_and_delete() {
    let cache = SqliteCache::new("p-", 3, db::MEMORY).await.unwrap();
    let rec = Record::new(
        "hello",
        vec![1.0, 2.0, 2.0],
        Some("https://example.com/a.md".to_string()),
        tags(&["x", "y"]),
    );
    cache.set(&rec.key(), &rec).await.unwrap();

    let got = cache.get(&rec.key()).await.unwrap().unwrap();
    assert_eq!(got.text, "hello");
    assert_eq!(got.embedding, vec![1.0, 2.0, 2.0]);
    assert!((got.norm - 3.0).abs() < 1e-6);
    assert_eq!(got.tags, tags(&["x", "y"]));
    assert!(cache.contains_key(&rec.key()).await.unwrap());
    assert_eq!(cache.size().await.unwrap(), 1);

    assert!(cache.delete(&rec.key()).await.unwrap());
    assert!(!cache.delete(&rec.key()).await.unwrap());
    assert!(cache.get(&rec.key()).await.unwrap().is_none());
    assert_eq!(cache.size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_prefixes_are_isolated() {
    let notes = SqliteCache::new("Documents-notes-", 2, db::MEMORY).await.unwrap();
    let mail = notes.with_prefix("Documents-mail-");
    let a = record("a", vec![1.0, 0.0], &[]);
    let b = record("b", vec![0.0, 1.0], &[]);
    notes.set(&a.key(), &a).await.unwrap();
    mail.set(&b.key(), &b).await.unwrap();

    assert_eq!(notes.size().await.unwrap(), 1);
    assert_eq!(mail.size().await.unwrap(), 1);
    assert!(notes.get(&b.key()).await.unwrap().is_none());
    assert_eq!(notes.full_entries().await.unwrap().len(), 2);

    let found = notes.find_records(&[0.0, 1.0], None, None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.text, "a");

    notes.clear().await.unwrap();
    assert_eq!(notes.size().await.unwrap(), 0);
    assert_eq!(mail.size().await.unwrap(), 1);

    let mut names = notes.collections("Documents-").await.unwrap();
    names.sort();
    assert_eq!(names, vec!["mail".to_string()]);
}

#[tokio::test]
async fn test_prefix_wildcards_match_literally() {
    let underscored = SqliteCache::new("Documents-a_b-", 2, db::MEMORY).await.unwrap();
    let lookalike = underscored.with_prefix("Documents-axb-");
    let rec = record("a", vec![1.0, 0.0], &[]);
    lookalike.set(&rec.key(), &rec).await.unwrap();
    assert_eq!(underscored.size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_records_tag_filter_is_exact() {
    let cache = SqliteCache::new("p-", 2, db::MEMORY).await.unwrap();
    let abc = record("abc", vec![1.0, 0.0], &["abc"]);
    let a = record("a", vec![0.0, 1.0], &["a"]);
    let none = record("none", vec![1.0, 1.0], &[]);
    for rec in [&abc, &a, &none] {
        cache.set(&rec.key(), rec).await.unwrap();
    }

    let filter = tags(&["a"]);
    let found = cache
        .find_records(&[1.0, 0.0], Some(filter.as_slice()), None)
        .await
        .unwrap();
    let texts: Vec<&str> = found.iter().map(|r| r.record.text.as_str()).collect();
    assert_eq!(texts, vec!["a"]);

    let all = cache.find_records(&[1.0, 0.0], Some(&[][..]), None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].record.text, "abc");
}

#[tokio::test]
async fn test_find_records_returns_k_nearest() {
    let cache = SqliteCache::new("p-", 2, db::MEMORY).await.unwrap();
    for i in 0..100 {
        let angle = i as f32 * 0.01;
        let parity = if i % 2 == 0 { "even" } else { "odd" };
        let rec = record(&format!("r{i}"), vec![angle.cos(), angle.sin()], &[parity]);
        cache.set(&rec.key(), &rec).await.unwrap();
    }

    let nearest = cache.find_records(&[1.0, 0.0], None, Some(5)).await.unwrap();
    let texts: Vec<&str> = nearest.iter().map(|r| r.record.text.as_str()).collect();
    assert_eq!(texts, vec!["r0", "r1", "r2", "r3", "r4"]);

    let even = tags(&["even"]);
    let nearest = cache
        .find_records(&[1.0, 0.0], Some(even.as_slice()), Some(3))
        .await
        .unwrap();
    let texts: Vec<&str> = nearest.iter().map(|r| r.record.text.as_str()).collect();
    assert_eq!(texts, vec!["r0", "r2", "r4"]);
}

#[tokio::test]
async fn test_clear_tags_matches_substrings() {
    let cache = SqliteCache::new("p-", 2, db::MEMORY).await.unwrap();
    let abc = record("abc", vec![1.0, 0.0], &["abc"]);
    let b = record("b", vec![0.0, 1.0], &["b"]);
    let untagged = record("untagged", vec![1.0, 1.0], &[]);
    for rec in [&abc, &b, &untagged] {
        cache.set(&rec.key(), rec).await.unwrap();
    }

    cache.clear_tags(&tags(&["a"])).await.unwrap();
    assert!(!cache.contains_key(&abc.key()).await.unwrap());
    assert!(cache.contains_key(&b.key()).await.unwrap());
    assert!(cache.contains_key(&untagged.key()).await.unwrap());

    cache.clear_tags(&[]).await.unwrap();
    assert_eq!(cache.size().await.unwrap(), 2);

    let embeddings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(cache.pool())
        .await
        .unwrap();
    assert_eq!(embeddings, 2);
}

#[tokio::test]
async fn test_dimension_mismatch() {
    let cache = SqliteCache::new("p-", 4, db::MEMORY).await.unwrap();
    let short = record("short", vec![1.0, 0.0], &[]);

    let err = cache.set(&short.key(), &short).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));

    let err = cache.find_records(&[1.0], None, None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_tags_union_keeps_source() {
    let cache = SqliteCache::new("p-", 2, db::MEMORY).await.unwrap();
    let one = Record::new("one", vec![1.0, 0.0], Some("a.txt".to_string()), tags(&["x"]));
    let two = Record::new("two", vec![0.0, 1.0], Some("b.txt".to_string()), tags(&["x", "y"]));
    cache.set(&one.key(), &one).await.unwrap();
    cache.set(&two.key(), &two).await.unwrap();

    let union = cache.tags().await.unwrap();
    assert_eq!(union.to_vec(), tags(&["x", "y"]));
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("documents.sqlite");
    let filename = path.to_string_lossy().into_owned();
    let rec = record("kept", vec![0.6, 0.8], &["t"]);

    {
        let cache = SqliteCache::new("Documents-default-", 2, &filename).await.unwrap();
        cache.set(&rec.key(), &rec).await.unwrap();
        cache.pool().close().await;
    }

    let cache = SqliteCache::new("Documents-default-", 2, &filename).await.unwrap();
    assert_eq!(cache.filename(), filename);
    let got = cache.get(&rec.key()).await.unwrap().unwrap();
    assert_eq!(got.text, "kept");
    assert_eq!(got.tags, tags(&["t"]));
}
