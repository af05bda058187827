//! Client for the hosted model service (sentence embeddings, DINOv2 image
//! embeddings, LLaVA captions).
//!
//! Endpoints take JSON and answer JSON:
//!
//! - `POST {base}{embed_path}`   `{"text": ..}`         -> `{"embedding": [..]}`
//! - `POST {base}{image_path}`   `{"image_base64": ..}` -> `{"embedding": [..]}`
//! - `POST {base}{caption_path}` `{"image_base64": ..}` -> `{"caption": ..}`

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sap_core::config::ProvidersConfig;
use sap_core::error::{Error, Result};
use sap_core::traits::{Captioner, ImageEmbedder, TextEmbedder};
use sap_core::types::{EmbeddingVector, QueryImage};

use crate::normalize::l2_normalize;

const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct RemoteModelClient {
    client: Client,
    embed_url: String,
    image_url: String,
    caption_url: String,
    normalize: bool,
}

impl RemoteModelClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("providers.base_url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            embed_url: join_url(base, &config.embed_path),
            image_url: join_url(base, &config.image_path),
            caption_url: join_url(base, &config.caption_path),
            normalize: config.normalize,
        })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            tracing::warn!(url, %status, "model service returned an error status");
            return Err(Error::ProviderError(format!(
                "{url} returned {status}: {}",
                truncate(&body, MAX_ERROR_BODY)
            )));
        }
        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                transport_error(url, &e)
            } else {
                Error::ProviderError(format!("undecodable response from {url}: {e}"))
            }
        })
    }

    fn finish_vector(&self, url: &str, mut embedding: EmbeddingVector) -> Result<EmbeddingVector> {
        if embedding.is_empty() {
            return Err(Error::ProviderError(format!("{url} returned an empty embedding")));
        }
        if self.normalize {
            l2_normalize(&mut embedding);
        }
        Ok(embedding)
    }
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ImageRequest {
    image_base64: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct CaptionResponse {
    caption: String,
}

#[async_trait]
impl TextEmbedder for RemoteModelClient {
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        let request = TextRequest { text: text.trim() };
        let response: EmbeddingResponse = self.post_json(&self.embed_url, &request).await?;
        self.finish_vector(&self.embed_url, response.embedding)
    }

    fn name(&self) -> &str {
        "remote-text"
    }
}

#[async_trait]
impl ImageEmbedder for RemoteModelClient {
    async fn embed_image(&self, image: &QueryImage) -> Result<EmbeddingVector> {
        let request = ImageRequest { image_base64: STANDARD.encode(image.as_bytes()) };
        let response: EmbeddingResponse = self.post_json(&self.image_url, &request).await?;
        self.finish_vector(&self.image_url, response.embedding)
    }

    fn name(&self) -> &str {
        "remote-image"
    }
}

#[async_trait]
impl Captioner for RemoteModelClient {
    async fn caption(&self, image: &QueryImage) -> Result<String> {
        let request = ImageRequest { image_base64: STANDARD.encode(image.as_bytes()) };
        let response: CaptionResponse = self.post_json(&self.caption_url, &request).await?;
        let caption = response.caption.trim();
        if caption.is_empty() {
            // a blank caption is a valid answer; caption search short-circuits on it
            tracing::debug!(url = %self.caption_url, "model service returned a blank caption");
        }
        Ok(caption.to_string())
    }

    fn name(&self) -> &str {
        "remote-caption"
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn transport_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ProviderUnavailable(format!("{url} timed out"))
    } else if err.is_connect() || err.is_request() {
        Error::ProviderUnavailable(format!("{url} unreachable: {err}"))
    } else {
        Error::ProviderError(format!("{url}: {err}"))
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
