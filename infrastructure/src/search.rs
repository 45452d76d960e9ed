use domain::errors::IndexError;
use domain::models::{Chunk, EmbeddingModel, ScoredChunk};

/// A chunk and the vector it was embedded to.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Exact nearest-neighbour index over chunk embeddings.
///
/// Entries keep their build order, which is also the tie-breaker for equal
/// scores, so a reloaded index ranks exactly like the one that was saved.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: EmbeddingModel,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn empty(model: EmbeddingModel) -> Self {
        Self {
            model,
            entries: Vec::new(),
        }
    }

    /// Build from entries in bulk. A model with unknown dimensions (0) takes
    /// them from the first vector; every vector must then agree.
    pub fn build(mut model: EmbeddingModel, entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        if model.dimensions == 0 {
            if let Some(first) = entries.first() {
                model.dimensions = first.vector.len();
            }
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != model.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: model.dimensions,
                actual: bad.vector.len(),
            });
        }
        Ok(Self { model, entries })
    }

    pub fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `top_k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.model.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.model.dimensions,
                actual: query.len(),
            });
        }

        let mut similarities: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (cosine_similarity(query, &entry.vector), i))
            .collect();

        similarities.sort_by(|a, b| rank_key(b.0).total_cmp(&rank_key(a.0)).then(a.1.cmp(&b.1)));
        Ok(similarities
            .into_iter()
            .take(top_k)
            .map(|(score, i)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

/// NaN scores (from NaN components) rank below everything else.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}
