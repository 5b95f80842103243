//! Text embeddings.
//!
//! The store must accept at least one embedding backend and ship a
//! deterministic fallback so it is usable without a GPU and reproducible
//! under test (spec §4.1). `HashEmbedder` is that fallback; `OnnxEmbedder`
//! is the optional model-backed path behind the `onnx` feature.

use std::path::Path;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use crate::MemoryError;

/// Embedding configuration. Dimension is fixed at store initialization and
/// cannot change without migration (spec §4.1).
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub max_seq_len: usize,
    pub embedding_dim: usize,
    pub normalize: bool,
    pub batch_size: usize,
    pub output_name: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_seq_len: 512,
            embedding_dim: 384,
            normalize: true,
            batch_size: 32,
            output_name: "last_hidden_state".to_string(),
        }
    }
}

/// Text embedder backed by an ONNX model when the `onnx` feature is on,
/// falling back to the deterministic hash embedder otherwise.
pub struct Embedder {
    #[cfg(feature = "onnx")]
    session: Session,
    #[cfg(feature = "onnx")]
    tokenizer: Tokenizer,
    config: EmbeddingConfig,
}

impl Embedder {
    #[cfg(feature = "onnx")]
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, MemoryError> {
        let session = Session::builder()
            .map_err(|e| MemoryError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MemoryError::Model(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| MemoryError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| MemoryError::Model(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| MemoryError::Model(e.to_string()))?;

        Ok(Self { session, tokenizer, config })
    }

    #[cfg(not(feature = "onnx"))]
    pub fn new(
        _model_path: impl AsRef<Path>,
        _tokenizer_path: impl AsRef<Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, MemoryError> {
        Ok(Self { config })
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        #[cfg(feature = "onnx")]
        {
            let embeddings = self.embed_batch(&[text])?;
            Ok(embeddings.into_iter().next().unwrap_or_default())
        }
        #[cfg(not(feature = "onnx"))]
        {
            Ok(HashEmbedder::new(self.config.clone()).embed(text))
        }
    }

    #[cfg(feature = "onnx")]
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            all_embeddings.extend(self.embed_batch_internal(chunk)?);
        }
        Ok(all_embeddings)
    }

    #[cfg(not(feature = "onnx"))]
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let embedder = HashEmbedder::new(self.config.clone());
        Ok(texts.iter().map(|t| embedder.embed(t)).collect())
    }

    #[cfg(feature = "onnx")]
    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let mut input_ids = vec![0i64; batch_size * self.config.max_seq_len];
        let mut attention_mask = vec![0i64; batch_size * self.config.max_seq_len];
        let mut token_type_ids = vec![0i64; batch_size * self.config.max_seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            let len = ids.len().min(self.config.max_seq_len);
            let offset = i * self.config.max_seq_len;

            for j in 0..len {
                input_ids[offset + j] = ids[j] as i64;
                attention_mask[offset + j] = mask[j] as i64;
                token_type_ids[offset + j] = types[j] as i64;
            }
        }

        let input_ids = Array2::from_shape_vec((batch_size, self.config.max_seq_len), input_ids)
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        let attention_mask =
            Array2::from_shape_vec((batch_size, self.config.max_seq_len), attention_mask)
                .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        let token_type_ids =
            Array2::from_shape_vec((batch_size, self.config.max_seq_len), token_type_ids)
                .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let input_ids_tensor = Tensor::from_array(input_ids).map_err(|e| MemoryError::Model(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(attention_mask).map_err(|e| MemoryError::Model(e.to_string()))?;
        let token_type_ids_tensor =
            Tensor::from_array(token_type_ids).map_err(|e| MemoryError::Model(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| MemoryError::Model(e.to_string()))?;

        let (shape, hidden_data) = outputs
            .get(&self.config.output_name)
            .ok_or_else(|| MemoryError::Model(format!("missing output tensor: {}", self.config.output_name)))?
            .try_extract_tensor::<f32>()
            .map_err(|e| MemoryError::Model(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let (tensor_batch, tensor_seq_len, tensor_hidden_dim) = if dims.len() == 3 {
            (dims[0], dims[1], dims[2])
        } else {
            return Err(MemoryError::Model(format!("unexpected tensor shape: {:?}", dims)));
        };

        let mut embeddings = Vec::with_capacity(batch_size);

        for i in 0..batch_size.min(tensor_batch) {
            let seq_len = encodings[i].get_ids().len().min(self.config.max_seq_len).min(tensor_seq_len);
            let mut embedding = vec![0.0f32; self.config.embedding_dim];

            for j in 0..seq_len {
                for k in 0..self.config.embedding_dim.min(tensor_hidden_dim) {
                    let idx = i * tensor_seq_len * tensor_hidden_dim + j * tensor_hidden_dim + k;
                    if idx < hidden_data.len() {
                        embedding[k] += hidden_data[idx];
                    }
                }
            }

            for v in &mut embedding {
                *v /= seq_len.max(1) as f32;
            }

            if self.config.normalize {
                let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut embedding {
                        *v /= norm;
                    }
                }
            }

            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    pub fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Deterministic hashed-feature embedding used when no model is configured.
/// For all texts `T`, `embed(T) == embed(T)` byte-for-byte across processes
/// (spec §8 testable property) — the computation has no randomness or
/// process-local state.
pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.config.embedding_dim];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.config.embedding_dim;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedder_dimension_matches_config() {
        let embedder = HashEmbedder::new(EmbeddingConfig::default());
        let embedding = embedder.embed("Hello world");

        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn hash_embedder_is_deterministic_across_instances() {
        let a = HashEmbedder::new(EmbeddingConfig::default()).embed("remember this");
        let b = HashEmbedder::new(EmbeddingConfig::default()).embed("remember this");
        assert_eq!(a, b);
    }

    #[test]
    fn config_default_is_384() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.embedding_dim, 384);
        assert!(config.normalize);
    }
}
