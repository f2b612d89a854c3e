//! On-disk layout for a [`VectorIndex`](super::index::VectorIndex).
//!
//! An index directory holds a single SQLite file, `index.sqlite`:
//! - `index_meta(key, value)`: format version, dimension, metric, entry count
//! - `index_entries`: one row per entry in insertion order (`seq`), with the
//!   normalised embedding stored as a little-endian f32 blob
//!
//! Saves go to a temporary file that is renamed into place once the
//! transaction commits, so readers never see a half-written index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::error::{RagError, RagResult};
use super::index::{IndexEntry, METRIC_COSINE};
use super::types::Passage;

pub const INDEX_FILE: &str = "index.sqlite";
const FORMAT_VERSION: &str = "1";

pub fn index_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

pub fn exists(dir: &Path) -> bool {
    index_file(dir).is_file()
}

/// Contents of a persisted index.
pub struct StoredIndex {
    pub dimension: Option<usize>,
    pub entries: Vec<IndexEntry>,
}

pub async fn save(dir: &Path, dimension: Option<usize>, entries: &[IndexEntry]) -> RagResult<()> {
    tokio::fs::create_dir_all(dir).await?;

    let final_path = index_file(dir);
    let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));
    if tokio::fs::try_exists(&tmp_path).await? {
        tokio::fs::remove_file(&tmp_path).await?;
    }

    let pool = open(&tmp_path, true).await?;
    init_schema(&pool).await?;

    let mut tx = pool.begin().await?;
    let meta = [
        ("format_version", FORMAT_VERSION.to_string()),
        ("dimension", dimension.unwrap_or(0).to_string()),
        ("metric", METRIC_COSINE.to_string()),
        ("entry_count", entries.len().to_string()),
    ];
    for (key, value) in meta {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    for (seq, entry) in entries.iter().enumerate() {
        let passage = &entry.passage;
        sqlx::query(
            "INSERT INTO index_entries
                (seq, entry_id, passage_id, text, source_name, file_type, char_offset, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(seq as i64)
        .bind(&entry.entry_id)
        .bind(&passage.id)
        .bind(&passage.text)
        .bind(&passage.source_name)
        .bind(&passage.file_type)
        .bind(passage.char_offset as i64)
        .bind(serialize_embedding(&entry.embedding))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    pool.close().await;

    tokio::fs::rename(&tmp_path, &final_path).await?;
    tracing::info!(
        "Saved index with {} entries to {}",
        entries.len(),
        final_path.display()
    );
    Ok(())
}

pub async fn load(dir: &Path) -> RagResult<StoredIndex> {
    let path = index_file(dir);
    if !path.is_file() {
        return Err(RagError::NotFound(dir.to_path_buf()));
    }

    let pool = open(&path, false).await.map_err(corrupt)?;
    let result = read_index(&pool).await;
    pool.close().await;

    let stored = result?;
    tracing::info!(
        "Loaded index with {} entries from {}",
        stored.entries.len(),
        path.display()
    );
    Ok(stored)
}

async fn read_index(pool: &SqlitePool) -> RagResult<StoredIndex> {
    let meta_rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await
        .map_err(corrupt)?;
    let mut meta: HashMap<String, String> = HashMap::new();
    for row in &meta_rows {
        let key: String = row.try_get("key").map_err(corrupt)?;
        let value: String = row.try_get("value").map_err(corrupt)?;
        meta.insert(key, value);
    }

    let version = meta_value(&meta, "format_version")?;
    if version != FORMAT_VERSION {
        return Err(RagError::CorruptIndex(format!(
            "unsupported format version {}",
            version
        )));
    }

    let metric = meta_value(&meta, "metric")?;
    if metric != METRIC_COSINE {
        return Err(RagError::CorruptIndex(format!(
            "metric tag '{}' does not match '{}'",
            metric, METRIC_COSINE
        )));
    }

    let dimension: usize = parse_meta(&meta, "dimension")?;
    let expected_count: usize = parse_meta(&meta, "entry_count")?;

    let rows = sqlx::query(
        "SELECT entry_id, passage_id, text, source_name, file_type, char_offset, embedding
         FROM index_entries ORDER BY seq",
    )
    .fetch_all(pool)
    .await
    .map_err(corrupt)?;

    if rows.len() != expected_count {
        return Err(RagError::CorruptIndex(format!(
            "expected {} entries, found {}",
            expected_count,
            rows.len()
        )));
    }
    if dimension == 0 && !rows.is_empty() {
        return Err(RagError::CorruptIndex(
            "entries present but dimension is unset".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let blob: Vec<u8> = row.try_get("embedding").map_err(corrupt)?;
        if blob.len() != dimension * 4 {
            return Err(RagError::CorruptIndex(format!(
                "embedding of {} bytes does not match dimension {}",
                blob.len(),
                dimension
            )));
        }
        let char_offset: i64 = row.try_get("char_offset").map_err(corrupt)?;
        entries.push(IndexEntry {
            entry_id: row.try_get("entry_id").map_err(corrupt)?,
            embedding: deserialize_embedding(&blob),
            passage: Passage {
                id: row.try_get("passage_id").map_err(corrupt)?,
                text: row.try_get("text").map_err(corrupt)?,
                source_name: row.try_get("source_name").map_err(corrupt)?,
                file_type: row.try_get("file_type").map_err(corrupt)?,
                char_offset: usize::try_from(char_offset).map_err(corrupt)?,
            },
        });
    }

    Ok(StoredIndex {
        dimension: (dimension > 0).then_some(dimension),
        entries,
    })
}

async fn open(path: &Path, create: bool) -> RagResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .read_only(!create)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> RagResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS index_entries (
            seq INTEGER PRIMARY KEY,
            entry_id TEXT NOT NULL UNIQUE,
            passage_id TEXT NOT NULL,
            text TEXT NOT NULL,
            source_name TEXT NOT NULL,
            file_type TEXT NOT NULL DEFAULT '',
            char_offset INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn meta_value<'a>(meta: &'a HashMap<String, String>, key: &str) -> RagResult<&'a str> {
    meta.get(key)
        .map(String::as_str)
        .ok_or_else(|| RagError::CorruptIndex(format!("missing '{}' tag", key)))
}

fn parse_meta(meta: &HashMap<String, String>, key: &str) -> RagResult<usize> {
    let raw = meta_value(meta, key)?;
    raw.parse()
        .map_err(|_| RagError::CorruptIndex(format!("'{}' tag is not a number: {}", key, raw)))
}

fn corrupt<E: std::fmt::Display>(err: E) -> RagError {
    RagError::CorruptIndex(err.to_string())
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
