//! On-disk form of a [`VectorIndex`]: a directory with `manifest.json`
//! (model identity and shape) and `index.db` (SQLite, one row per chunk).

use crate::search::{IndexEntry, VectorIndex};
use anyhow::{anyhow, Context};
use domain::errors::IndexError;
use domain::models::{Chunk, EmbeddingModel};
use rusqlite::{params, Connection, OpenFlags, Result as SqlResult};
use serde::{Deserialize, Serialize};
use shared::types::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DATABASE_FILE: &str = "index.db";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunks: usize,
}

pub struct EmbeddingStorage {
    dir: PathBuf,
}

impl EmbeddingStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when a complete index (manifest written last) is present.
    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).is_file()
    }

    /// Replace whatever index is stored in the directory with `index`.
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        // Drop the manifest first so a half-written index is never mistaken for a complete one.
        remove_if_exists(&self.dir.join(MANIFEST_FILE))?;
        let db_path = self.dir.join(DATABASE_FILE);
        for suffix in ["", "-journal", "-wal", "-shm"] {
            remove_if_exists(&PathBuf::from(format!("{}{suffix}", db_path.display())))?;
        }

        let mut conn = Connection::open(&db_path)
            .with_context(|| format!("failed to create {}", db_path.display()))?;
        Self::setup_db(&conn)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (position, id, source, page, start_offset, text, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for entry in index.entries() {
                stmt.execute(params![
                    entry.chunk.position as i64,
                    entry.chunk.id,
                    entry.chunk.source.to_string_lossy().into_owned(),
                    entry.chunk.page,
                    entry.chunk.start as i64,
                    entry.chunk.text,
                    encode_vector(&entry.vector),
                ])?;
            }
        }
        tx.commit()?;
        drop(conn);

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            embedding_model: index.model().name.clone(),
            dimensions: index.model().dimensions,
            chunks: index.len(),
        };
        fs::write(
            self.dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        tracing::info!(dir = %self.dir.display(), chunks = index.len(), "vector index saved");
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<IndexManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(IndexError::NotFound {
                path: self.dir.display().to_string(),
            }
            .into());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: IndexManifest = serde_json::from_str(&data)
            .with_context(|| format!("malformed index manifest {}", path.display()))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: manifest.format_version,
                expected: FORMAT_VERSION,
            }
            .into());
        }
        Ok(manifest)
    }

    /// Load the stored index, refusing it unless it was built by
    /// `expected_model`.
    pub fn load(&self, expected_model: &str) -> Result<VectorIndex> {
        let manifest = self.read_manifest()?;
        if manifest.embedding_model != expected_model {
            return Err(IndexError::ModelMismatch {
                path: self.dir.display().to_string(),
                stored: manifest.embedding_model,
                configured: expected_model.to_string(),
            }
            .into());
        }

        let db_path = self.dir.join(DATABASE_FILE);
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let entries = Self::read_entries(&conn)
            .with_context(|| format!("failed to read {}", db_path.display()))?;
        if entries.len() != manifest.chunks {
            return Err(anyhow!(
                "index at {} is inconsistent: manifest lists {} chunks, database holds {}",
                self.dir.display(),
                manifest.chunks,
                entries.len()
            ));
        }

        let model = EmbeddingModel {
            name: manifest.embedding_model,
            dimensions: manifest.dimensions,
        };
        let index = VectorIndex::build(model, entries)?;
        tracing::info!(dir = %self.dir.display(), chunks = index.len(), "vector index loaded");
        Ok(index)
    }

    fn setup_db(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            "
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            CREATE TABLE IF NOT EXISTS chunks (
                row_order INTEGER PRIMARY KEY,
                position INTEGER NOT NULL,
                id TEXT NOT NULL,
                source TEXT NOT NULL,
                page INTEGER,
                start_offset INTEGER NOT NULL,
                text TEXT NOT NULL,
                vector BLOB NOT NULL
            );
        ",
        )
    }

    fn read_entries(conn: &Connection) -> Result<Vec<IndexEntry>> {
        let mut stmt = conn.prepare(
            "SELECT position, id, source, page, start_offset, text, vector
             FROM chunks ORDER BY row_order",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let position: i64 = row.get(0)?;
            let source: String = row.get(2)?;
            let start: i64 = row.get(4)?;
            let vector_bytes: Vec<u8> = row.get(6)?;
            entries.push(IndexEntry {
                chunk: Chunk {
                    id: row.get(1)?,
                    text: row.get(5)?,
                    source: PathBuf::from(source),
                    page: row.get(3)?,
                    position: usize::try_from(position)?,
                    start: usize::try_from(start)?,
                },
                vector: decode_vector(&vector_bytes)?,
            });
        }
        Ok(entries)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Little-endian f32s, so a reload reproduces every component bit for bit.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(anyhow!("vector blob has {} bytes, not a multiple of 4", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
