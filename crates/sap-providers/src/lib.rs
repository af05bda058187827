//! External model collaborators for the SAP router: the hosted embedding /
//! captioning service, an OpenAI-compatible chat client, deterministic fakes,
//! and a timeout decorator shared by all of them.

use std::sync::Arc;
use std::time::Duration;

use sap_core::config::ProvidersConfig;
use sap_core::error::Result;
use sap_core::traits::{Captioner, ImageEmbedder, TextEmbedder};

pub mod chat;
pub mod fake;
pub mod http;
pub mod normalize;
pub mod timeout;

pub use chat::OpenAiChatClient;
pub use fake::{FakeCaptioner, FakeEmbedder};
pub use http::RemoteModelClient;
pub use normalize::{l2_normalize, l2_normalized};
pub use timeout::WithTimeout;

/// The three model providers a router needs.
#[derive(Clone)]
pub struct ProviderSet {
    pub text: Arc<dyn TextEmbedder>,
    pub image: Arc<dyn ImageEmbedder>,
    pub captioner: Arc<dyn Captioner>,
}

impl ProviderSet {
    pub fn new(
        text: Arc<dyn TextEmbedder>,
        image: Arc<dyn ImageEmbedder>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        Self { text, image, captioner }
    }

    /// One remote client serving all three roles, bounded by the configured timeout.
    pub fn remote(config: &ProvidersConfig) -> Result<Self> {
        let client = Arc::new(RemoteModelClient::new(config)?);
        tracing::info!(base_url = %config.base_url, "using remote model service");
        Ok(Self::new(client.clone(), client.clone(), client).with_timeout(config.timeout()))
    }

    /// Deterministic offline providers with the given index dimensions.
    pub fn fake(text_dim: usize, image_dim: usize) -> Self {
        tracing::info!(text_dim, image_dim, "using fake model providers");
        Self::new(
            Arc::new(FakeEmbedder::new(text_dim)),
            Arc::new(FakeEmbedder::new(image_dim)),
            Arc::new(FakeCaptioner),
        )
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            text: Arc::new(WithTimeout::new(self.text, timeout)),
            image: Arc::new(WithTimeout::new(self.image, timeout)),
            captioner: Arc::new(WithTimeout::new(self.captioner, timeout)),
        }
    }
}

/// Whether fake providers were requested by config or `APP_USE_FAKE_EMBEDDINGS`.
pub fn use_fake_providers(config: &ProvidersConfig) -> bool {
    config.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}
