pub mod answer_service;
pub mod context;
pub mod rag_service;
