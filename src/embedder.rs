use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Turns text into a fixed-length semantic vector. The same implementation
/// (model + dimension) must serve every ingest and every query for the
/// lifetime of one store; [`EmbeddingConfig`] records and enforces that.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Stable identifier of the model, recorded alongside the store.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// The embedding configuration persisted with the graph. Ingests and
/// semantic queries against a store whose record differs from the active
/// embedder fail with [`Error::EmbeddingConfigMismatch`] before touching
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dimension: usize,
}

impl EmbeddingConfig {
    pub fn of(embedder: &dyn Embedder) -> Self {
        Self {
            model_id: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
        }
    }
}

/// Normalize text before it reaches the embedder: lower-cased, whitespace
/// collapsed. Applied identically at ingest and query time so both sides of
/// a similarity comparison live in the same space.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A deterministic hashed bag-of-words embedder.
///
/// Each token hashes to a signed bucket; the accumulated vector is
/// L2-normalized. No model download, no network, identical output for
/// identical input on every run. Useful for offline smoke testing and as
/// the test-suite embedder; not a substitute for a trained model's
/// semantics.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("hashing-v1-d{dimension}"),
            dimension,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(feature = "fastembed")]
pub use fast::FastEmbedder;

#[cfg(feature = "fastembed")]
mod fast {
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::Embedder;
    use crate::error::{Error, Result};

    /// Local sentence-embedding inference via fastembed.
    ///
    /// The model is loaded lazily on the first `embed` call; construction
    /// stays cheap so `status`-style commands never pay the load cost.
    pub struct FastEmbedder {
        model: Mutex<Option<TextEmbedding>>,
        which: EmbeddingModel,
        model_id: String,
        dimension: usize,
    }

    impl FastEmbedder {
        /// The default model mirrors all-MiniLM-L6-v2 (384 dimensions).
        pub fn new() -> Self {
            Self::with_model(EmbeddingModel::AllMiniLML6V2)
        }

        pub fn with_model(which: EmbeddingModel) -> Self {
            let dimension = match which {
                EmbeddingModel::AllMiniLML6V2 => 384,
                EmbeddingModel::BGESmallENV15 => 384,
                EmbeddingModel::BGEBaseENV15 => 768,
                EmbeddingModel::BGELargeENV15 => 1024,
                EmbeddingModel::NomicEmbedTextV15 => 768,
                _ => 384,
            };

            Self {
                model: Mutex::new(None),
                model_id: format!("fastembed/{which:?}"),
                which,
                dimension,
            }
        }

        /// Resolve a user-facing model name. Accepts the short names used
        /// by the `--model` flag.
        pub fn parse_model(name: &str) -> Result<EmbeddingModel> {
            match name.to_lowercase().as_str() {
                "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
                "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
                "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
                "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
                "nomic-embed-text-v1.5" => {
                    Ok(EmbeddingModel::NomicEmbedTextV15)
                }
                other => Err(Error::Config(format!(
                    "unknown embedding model '{other}'"
                ))),
            }
        }
    }

    impl Default for FastEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(Error::Embedding("empty input text".into()));
            }

            let mut guard = self
                .model
                .lock()
                .map_err(|_| Error::Embedding("model lock poisoned".into()))?;

            if guard.is_none() {
                let model = TextEmbedding::try_new(
                    InitOptions::new(self.which.clone()),
                )
                .map_err(|e| {
                    Error::Embedding(format!("model load failed: {e}"))
                })?;
                *guard = Some(model);
            }

            let model = guard.as_mut().ok_or_else(|| {
                Error::Embedding("model unavailable".into())
            })?;

            let mut vectors = model
                .embed(vec![text.to_string()], None)
                .map_err(|e| Error::Embedding(e.to_string()))?;

            vectors
                .pop()
                .ok_or_else(|| Error::Embedding("no vector produced".into()))
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}
