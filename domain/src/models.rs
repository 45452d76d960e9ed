use serde::{Deserialize, Serialize};
use shared::utils::display_name;
use std::fmt;
use std::path::PathBuf;

/// Text of one page of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source: PathBuf,
    /// 1-based page number; `None` when the extractor could not tell.
    pub page: Option<u32>,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<PathBuf>, page: Option<u32>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page,
            text: text.into(),
        }
    }
}

/// A contiguous window of a [`Document`]'s text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source: PathBuf,
    pub page: Option<u32>,
    /// Order of the chunk within one index build.
    pub position: usize,
    /// Character offset of the chunk inside its page text.
    pub start: usize,
}

impl Chunk {
    pub fn source_name(&self) -> String {
        display_name(&self.source)
    }

    pub fn page_label(&self) -> PageLabel {
        PageLabel(self.page)
    }
}

/// Renders an optional page number as `page 3` or `page ?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLabel(pub Option<u32>);

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(page) => write!(f, "page {page}"),
            None => write!(f, "page ?"),
        }
    }
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Identity of the model that produced an index's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub name: String,
    /// 0 only for an index built from zero chunks with a backend that
    /// learns its dimensionality from the first response.
    pub dimensions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Synthesized by the language model.
    Llm,
    /// Retrieved passages quoted directly.
    Offline,
    /// The language model was requested but no credential is configured.
    NotConfigured,
    /// Nothing was retrieved.
    NoContext,
}

/// Reference from an answer back to one retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// 1-based marker number, as written in the answer (`[1]`).
    pub index: usize,
    pub source: String,
    pub page: Option<u32>,
    pub excerpt: String,
}

impl Citation {
    pub fn page_label(&self) -> PageLabel {
        PageLabel(self.page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub body: String,
    pub citations: Vec<Citation>,
    pub mode: AnswerMode,
    /// Extra line for the user, e.g. why the primary model was skipped.
    pub notice: Option<String>,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub documents: usize,
    pub chunks: usize,
}
