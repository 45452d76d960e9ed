use anyhow::{bail, Context};
use dotenvy::dotenv;
use shared::types::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Which backend turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Ollama `/api/embeddings`.
    Ollama,
    /// Local feature hashing; needs no server.
    Hashing,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" | "hash" | "local" => Ok(Self::Hashing),
            other => bail!("unknown embedder '{other}' (expected 'ollama' or 'hashing')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub llm_timeout: Duration,
    pub embedder: EmbedderKind,
    pub embedding_model: String,
    pub ollama_base_url: String,
    pub hashing_dimensions: usize,
    pub vectorstore_path: PathBuf,
    pub papers_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub upload_chunk_overlap: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            llm_timeout: Duration::from_secs(60),
            embedder: EmbedderKind::Ollama,
            embedding_model: "all-minilm".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            hashing_dimensions: 384,
            vectorstore_path: PathBuf::from("vectorstore"),
            papers_dir: PathBuf::from("data/papers"),
            upload_dir: PathBuf::from("uploaded_pdfs"),
            chunk_size: 1000,
            chunk_overlap: 200,
            upload_chunk_overlap: 150,
            top_k: 4,
            max_context_chars: 12_000,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment (and `.env`, if present).
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        config.gemini_api_key = get(API_KEY_ENV);
        if let Some(v) = get("GEMINI_MODEL") {
            config.gemini_model = v;
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            config.gemini_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("LLM_TIMEOUT_SECS") {
            config.llm_timeout = Duration::from_secs(parse_number("LLM_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("EMBEDDER") {
            config.embedder = v.parse()?;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            config.ollama_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("HASHING_DIMENSIONS") {
            config.hashing_dimensions = parse_number("HASHING_DIMENSIONS", &v)?;
        }
        if let Some(v) = get("VECTORSTORE_PATH") {
            config.vectorstore_path = PathBuf::from(v);
        }
        if let Some(v) = get("PAPERS_DIR") {
            config.papers_dir = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CHUNK_SIZE") {
            config.chunk_size = parse_number("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            config.chunk_overlap = parse_number("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("UPLOAD_CHUNK_OVERLAP") {
            config.upload_chunk_overlap = parse_number("UPLOAD_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("TOP_K") {
            config.top_k = parse_number("TOP_K", &v)?;
        }
        if let Some(v) = get("MAX_CONTEXT_CHARS") {
            config.max_context_chars = parse_number("MAX_CONTEXT_CHARS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("CHUNK_SIZE must be at least 1");
        }
        for (name, overlap) in [
            ("CHUNK_OVERLAP", self.chunk_overlap),
            ("UPLOAD_CHUNK_OVERLAP", self.upload_chunk_overlap),
        ] {
            if overlap >= self.chunk_size {
                bail!(
                    "{name} ({overlap}) must be smaller than CHUNK_SIZE ({})",
                    self.chunk_size
                );
            }
        }
        if self.top_k == 0 {
            bail!("TOP_K must be at least 1");
        }
        if self.embedder == EmbedderKind::Hashing && self.hashing_dimensions == 0 {
            bail!("HASHING_DIMENSIONS must be at least 1");
        }
        Ok(())
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("{key} must be a non-negative integer, got '{value}'"))
}
