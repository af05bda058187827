use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use sap_core::error::{Error, Result};
use sap_core::traits::{Captioner, ChatCompleter, ImageEmbedder, TextEmbedder};
use sap_core::types::{ChatMessage, EmbeddingVector, QueryImage};

/// Bounds every call of the wrapped provider. An elapsed call surfaces as
/// `ProviderUnavailable`; the inner future is dropped.
#[derive(Debug, Clone)]
pub struct WithTimeout<P> {
    inner: P,
    timeout: Duration,
}

impl<P> WithTimeout<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, what: &str, provider: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(provider, what, timeout_ms = self.timeout.as_millis() as u64, "provider call timed out");
                Err(Error::ProviderUnavailable(format!(
                    "{what} via {provider} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<P: TextEmbedder> TextEmbedder for WithTimeout<P> {
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        self.bounded("text embedding", self.inner.name(), self.inner.embed_text(text)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<P: ImageEmbedder> ImageEmbedder for WithTimeout<P> {
    async fn embed_image(&self, image: &QueryImage) -> Result<EmbeddingVector> {
        self.bounded("image embedding", self.inner.name(), self.inner.embed_image(image)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<P: Captioner> Captioner for WithTimeout<P> {
    async fn caption(&self, image: &QueryImage) -> Result<String> {
        self.bounded("caption", self.inner.name(), self.inner.caption(image)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<P: ChatCompleter> ChatCompleter for WithTimeout<P> {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.bounded("chat completion", self.inner.name(), self.inner.complete(messages)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
