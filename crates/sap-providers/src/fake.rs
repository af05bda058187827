//! Deterministic offline providers.
//!
//! Selected with `APP_USE_FAKE_EMBEDDINGS=1` (or `providers.use_fake`) so the
//! router can run end to end without the hosted model service.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use sap_core::error::Result;
use sap_core::traits::{Captioner, ImageEmbedder, TextEmbedder};
use sap_core::types::{EmbeddingVector, QueryImage};

use crate::normalize::l2_normalize;

const IMAGE_CHUNK: usize = 64;

/// Token-hashing embedder producing unit vectors of a fixed dimension.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Hashes each token into one bucket. The small position-dependent bump
    /// keeps repeated tokens from producing identical vectors for reordered input.
    fn embed_tokens<'a>(&self, tokens: impl Iterator<Item = &'a [u8]>) -> EmbeddingVector {
        let mut v = vec![0f32; self.dim];
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl TextEmbedder for FakeEmbedder {
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        Ok(self.embed_tokens(text.split_whitespace().map(str::as_bytes)))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[async_trait]
impl ImageEmbedder for FakeEmbedder {
    async fn embed_image(&self, image: &QueryImage) -> Result<EmbeddingVector> {
        Ok(self.embed_tokens(image.as_bytes().chunks(IMAGE_CHUNK)))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Captioner that describes an image by its content hash.
#[derive(Debug, Clone, Default)]
pub struct FakeCaptioner;

#[async_trait]
impl Captioner for FakeCaptioner {
    async fn caption(&self, image: &QueryImage) -> Result<String> {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(image.as_bytes());
        Ok(format!(
            "A green herbaceous plant with lobed leaves and small flowers (sample {:016x}).",
            hasher.finish()
        ))
    }

    fn name(&self) -> &str {
        "fake"
    }
}
