use anyhow::Context;
use domain::models::{Document, EmbeddingModel, IngestReport, ScoredChunk};
use infrastructure::{
    chunker::TextChunker,
    embedder::Embedder,
    embedding_storage::EmbeddingStorage,
    file_scanner::{FileScanner, ScanOutcome},
    search::{IndexEntry, VectorIndex},
};
use shared::telemetry::Telemetry;
use shared::types::Result;
use std::path::{Path, PathBuf};

/// PDF files in, vector index out.
pub struct IngestionPipeline<'a> {
    embedder: &'a Embedder,
    chunker: TextChunker,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(embedder: &'a Embedder, chunker: TextChunker) -> Self {
        Self { embedder, chunker }
    }

    /// Index every PDF under `dir`. A missing directory is an error; an
    /// empty one gives an empty index.
    pub async fn build_from_dir(&self, dir: &Path) -> Result<(VectorIndex, IngestReport)> {
        let outcome = FileScanner::new(dir)
            .scan_documents()
            .with_context(|| format!("failed to scan {}", dir.display()))?;
        self.build_from_scan(outcome).await
    }

    /// Index exactly the given files.
    pub async fn build_from_files(&self, files: &[PathBuf]) -> Result<(VectorIndex, IngestReport)> {
        let root = files
            .first()
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let outcome = FileScanner::new(root).scan_paths(files);
        self.build_from_scan(outcome).await
    }

    /// Build from `dir` and replace whatever index `storage` holds.
    pub async fn ingest_into(
        &self,
        dir: &Path,
        storage: &EmbeddingStorage,
    ) -> Result<IngestReport> {
        let (index, report) = self.build_from_dir(dir).await?;
        storage.save(&index)?;
        Ok(report)
    }

    async fn build_from_scan(&self, outcome: ScanOutcome) -> Result<(VectorIndex, IngestReport)> {
        let ScanOutcome {
            documents,
            files_seen,
            files_skipped,
        } = outcome;
        let mut report = IngestReport {
            files_seen,
            files_skipped,
            documents: documents.len(),
            chunks: 0,
        };
        let index = self.build_from_documents(&documents).await?;
        report.chunks = index.len();
        tracing::info!(
            files = report.files_seen,
            skipped = report.files_skipped,
            pages = report.documents,
            chunks = report.chunks,
            "ingestion finished"
        );
        Ok((index, report))
    }

    pub async fn build_from_documents(&self, documents: &[Document]) -> Result<VectorIndex> {
        let telemetry = Telemetry::new();
        let chunks = self.chunker.chunk_documents(documents);
        tracing::info!(
            chunks = chunks.len(),
            size = self.chunker.chunk_size(),
            overlap = self.chunker.chunk_overlap(),
            "chunked documents"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        tracing::info!(
            vectors = vectors.len(),
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "embedded chunks"
        );

        let model = EmbeddingModel {
            name: self.embedder.model_name(),
            dimensions: self.embedder.dimensions().unwrap_or(0),
        };
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        Ok(VectorIndex::build(model, entries)?)
    }
}

/// Fixed top-k similarity search over a loaded index.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a Embedder,
    k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a Embedder, k: usize) -> Self {
        Self {
            index,
            embedder,
            k: k.max(1),
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let results = self.index.search(&vector, self.k)?;
        tracing::debug!(k = self.k, hits = results.len(), "retrieved chunks");
        Ok(results)
    }
}

/// Open the persisted index, checking it was built by `embedder`.
pub fn load_index(storage: &EmbeddingStorage, embedder: &Embedder) -> Result<VectorIndex> {
    storage.load(&embedder.model_name())
}
