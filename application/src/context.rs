use crate::answer_service::{AnswerSettings, LlmAnswerer, OfflineAnswerer};
use crate::rag_service::{load_index, IngestionPipeline, Retriever};
use anyhow::Context;
use domain::models::{Answer, IngestReport, ScoredChunk};
use infrastructure::{
    chunker::{SplitStrategy, TextChunker},
    config::Config,
    embedder::Embedder,
    embedding_storage::EmbeddingStorage,
    gemini_client::GeminiClient,
    search::VectorIndex,
};
use shared::types::Result;
use shared::utils::{display_name, is_supported_file};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Which answerer handles a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerBackend {
    Llm,
    Offline,
}

impl AnswerBackend {
    pub fn toggled(self) -> Self {
        match self {
            AnswerBackend::Llm => AnswerBackend::Offline,
            AnswerBackend::Offline => AnswerBackend::Llm,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnswerBackend::Llm => "language model",
            AnswerBackend::Offline => "offline",
        }
    }
}

/// Process-wide state, built once at startup: configuration, the embedder
/// shared by indexing and querying, and both answerers.
pub struct AppContext {
    config: Config,
    embedder: Embedder,
    llm: LlmAnswerer<GeminiClient>,
    offline: OfflineAnswerer,
}

impl AppContext {
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        let settings = AnswerSettings {
            max_context_chars: config.max_context_chars,
            ..AnswerSettings::default()
        };
        let embedder = Embedder::from_config(&config);
        let gemini = GeminiClient::from_config(&config)?;
        if !gemini.is_configured() {
            tracing::info!("no Gemini API key configured; model answers are unavailable");
        }
        tracing::debug!(embedder = %embedder.model_name(), "application context ready");
        Ok(Self {
            embedder,
            llm: LlmAnswerer::new(gemini, settings),
            offline: OfflineAnswerer::new(settings),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn llm_configured(&self) -> bool {
        self.llm.model().is_configured()
    }

    pub fn storage(&self) -> EmbeddingStorage {
        EmbeddingStorage::new(&self.config.vectorstore_path)
    }

    fn pipeline(&self, overlap: usize) -> Result<IngestionPipeline<'_>> {
        let chunker = TextChunker::new(self.config.chunk_size, overlap, SplitStrategy::Recursive)?;
        Ok(IngestionPipeline::new(&self.embedder, chunker))
    }

    /// Rebuild the persisted index from the papers directory.
    pub async fn ingest_preloaded(&self) -> Result<IngestReport> {
        self.pipeline(self.config.chunk_overlap)?
            .ingest_into(&self.config.papers_dir, &self.storage())
            .await
    }

    pub fn load_preloaded(&self) -> Result<VectorIndex> {
        load_index(&self.storage(), &self.embedder)
    }

    /// Copy `files` into a freshly wiped upload directory and index them.
    /// The result is kept in memory only.
    pub async fn build_from_uploads(
        &self,
        files: &[PathBuf],
    ) -> Result<(VectorIndex, IngestReport)> {
        let copied = stage_uploads(&self.config.upload_dir, files)?;
        self.pipeline(self.config.upload_chunk_overlap)?
            .build_from_files(&copied)
            .await
    }

    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        question: &str,
    ) -> Result<Vec<ScoredChunk>> {
        Retriever::new(index, &self.embedder, self.config.top_k)
            .retrieve(question)
            .await
    }

    pub async fn answer(
        &self,
        backend: AnswerBackend,
        question: &str,
        chunks: &[ScoredChunk],
    ) -> Answer {
        match backend {
            AnswerBackend::Llm => self.llm.answer(question, chunks).await,
            AnswerBackend::Offline => self.offline.answer(question, chunks),
        }
    }
}

/// Copy each PDF into a freshly wiped `upload_dir`. Every source is checked
/// before anything is removed, so a bad path leaves the old uploads intact.
/// Files sharing a name get a numeric suffix (`paper.pdf`, `paper-2.pdf`).
fn stage_uploads(upload_dir: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let current = upload_dir.canonicalize().ok();
    for file in files {
        if !is_supported_file(file) {
            anyhow::bail!("{} is not a PDF", file.display());
        }
        let resolved = file
            .canonicalize()
            .with_context(|| format!("cannot read {}", file.display()))?;
        if current.as_ref().is_some_and(|dir| resolved.starts_with(dir)) {
            anyhow::bail!(
                "{} is already in the upload directory; upload it from its original location",
                file.display()
            );
        }
    }

    if upload_dir.exists() {
        fs::remove_dir_all(upload_dir)
            .with_context(|| format!("failed to clear {}", upload_dir.display()))?;
    }
    fs::create_dir_all(upload_dir)
        .with_context(|| format!("failed to create {}", upload_dir.display()))?;

    let mut taken = HashSet::new();
    let mut copied = Vec::with_capacity(files.len());
    for file in files {
        let target = upload_dir.join(unique_name(file, &mut taken));
        fs::copy(file, &target).with_context(|| format!("failed to copy {}", file.display()))?;
        copied.push(target);
    }
    Ok(copied)
}

/// Names are compared case-insensitively so staging behaves the same on
/// case-folding filesystems.
fn unique_name(file: &Path, taken: &mut HashSet<String>) -> String {
    let name = display_name(file);
    if taken.insert(name.to_lowercase()) {
        return name;
    }
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let ext = file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (2..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| taken.insert(candidate.to_lowercase()))
        .unwrap_or(name)
}
