pub mod errors;
pub mod llm;
pub mod models;
