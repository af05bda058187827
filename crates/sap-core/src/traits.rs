//! Narrow interfaces to the model services the core depends on.
//!
//! Implementations must return typed provider failures
//! (`ProviderUnavailable` / `ProviderError`) and must not retry internally;
//! retry policy belongs to the caller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, EmbeddingVector, QueryImage};

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a query or caption into the text/caption index space.
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    async fn embed_image(&self, image: &QueryImage) -> Result<EmbeddingVector>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe the plant in the image as a single paragraph.
    async fn caption(&self, image: &QueryImage) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TextEmbedder + ?Sized> TextEmbedder for Arc<T> {
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        (**self).embed_text(text).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: ImageEmbedder + ?Sized> ImageEmbedder for Arc<T> {
    async fn embed_image(&self, image: &QueryImage) -> Result<EmbeddingVector> {
        (**self).embed_image(image).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Captioner + ?Sized> Captioner for Arc<T> {
    async fn caption(&self, image: &QueryImage) -> Result<String> {
        (**self).caption(image).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: ChatCompleter + ?Sized> ChatCompleter for Arc<T> {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).complete(messages).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
