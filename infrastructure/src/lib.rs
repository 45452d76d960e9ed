pub mod chunker;
pub mod config;
pub mod embedder;
pub mod embedding_storage;
pub mod file_scanner;
pub mod gemini_client;
pub mod ollama_client;
pub mod search;
