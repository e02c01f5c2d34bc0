//! SQLite-backed vector store.
//!
//! Append-only: records are never updated or deleted. Identifiers are
//! `doc_<n>` where `n` continues from the collection's size at insert time.
//! The size read and the inserts happen in one transaction under the
//! connection lock, so concurrent writers cannot hand out the same id.
//!
//! Similarity search is a brute-force cosine scan over the stored vectors.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use ragdesk_core::error::{RagDeskError, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

/// A record waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub text: String,
    pub department: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub department: String,
    pub source: String,
    pub score: f64,
}

pub struct VectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

fn store_err(e: impl std::fmt::Display) -> RagDeskError {
    RagDeskError::Store(e.to_string())
}

impl VectorStore {
    /// Open or create the store file.
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::init(conn, collection)
    }

    pub fn open_in_memory(collection: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn, collection)
    }

    fn init(conn: Connection, collection: &str) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS vector_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                department TEXT NOT NULL,
                source TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_vector_records_department
                ON vector_records (collection, department);",
        )
        .map_err(store_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of records in this collection.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(store_err)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vector_records WHERE collection = ?1",
                params![self.collection],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(n as usize)
    }

    /// Append records and return their freshly assigned ids, in input order.
    pub fn add(&self, records: &[NewRecord]) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.lock().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;

        let existing: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM vector_records WHERE collection = ?1",
                params![self.collection],
                |r| r.get(0),
            )
            .map_err(store_err)?;

        let now = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO vector_records
                        (collection, id, document, department, source, embedding, dims, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(store_err)?;
            for (i, rec) in records.iter().enumerate() {
                let id = format!("doc_{}", existing as usize + i);
                stmt.execute(params![
                    self.collection,
                    id,
                    rec.text,
                    rec.department,
                    rec.source,
                    f32_vec_to_bytes(&rec.embedding),
                    rec.embedding.len() as i64,
                    now,
                ])
                .map_err(store_err)?;
                ids.push(id);
            }
        }
        tx.commit().map_err(store_err)?;
        Ok(ids)
    }

    /// Nearest records by cosine similarity, best first.
    ///
    /// `department = None` searches the whole collection; otherwise only
    /// records whose department equals the filter are considered.
    pub fn search(
        &self,
        query: &[f32],
        department: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(store_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, document, department, source, embedding, dims
                 FROM vector_records
                 WHERE collection = ?1 AND (?2 IS NULL OR department = ?2)
                 ORDER BY seq",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![self.collection, department], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(store_err)?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, text, dept, source, blob, dims) = row.map_err(store_err)?;
            if dims as usize != query.len() {
                continue;
            }
            let stored = bytes_to_f32_vec(&blob);
            scored.push(ScoredRecord {
                id,
                text,
                department: dept,
                source,
                score: cosine_similarity(query, &stored),
            });
        }

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Distinct departments present in the collection.
    pub fn departments(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT department, COUNT(*) FROM vector_records
                 WHERE collection = ?1 GROUP BY department ORDER BY department",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize))
            })
            .map_err(store_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(store_err)
    }
}

fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
