use sap_core::config::StoresConfig;
use sap_core::error::{Error, Result};
use sap_core::traits::{ImageEmbedder, TextEmbedder};
use sap_core::types::{IndexRecord, Modality, QueryImage, SearchHit};

use crate::index::{IndexStats, VectorIndex};

/// Owns the text, caption and image indices. Immutable once built; share it
/// behind an `Arc` (or a [`crate::SharedRetriever`]).
#[derive(Debug)]
pub struct Retriever {
    text: VectorIndex,
    caption: VectorIndex,
    image: VectorIndex,
}

impl Retriever {
    pub fn new(text: VectorIndex, caption: VectorIndex, image: VectorIndex) -> Result<Self> {
        for (index, expected) in [(&text, Modality::Text), (&caption, Modality::Caption), (&image, Modality::Image)] {
            if index.modality() != expected {
                return Err(Error::InvalidConfig(format!(
                    "{} index supplied where the {expected} index belongs",
                    index.modality()
                )));
            }
        }
        // captions are embedded with the text model
        if text.dim() != caption.dim() {
            return Err(Error::CorruptIndex(format!(
                "caption index dimension {} differs from text index dimension {}",
                caption.dim(),
                text.dim()
            )));
        }
        Ok(Self { text, caption, image })
    }

    /// Open all three stores. Any failure is fatal for the caller.
    pub fn open(stores: &StoresConfig) -> Result<Self> {
        let text = VectorIndex::open(&stores.dir_for(Modality::Text), Modality::Text)?;
        let caption = VectorIndex::open(&stores.dir_for(Modality::Caption), Modality::Caption)?;
        let image = VectorIndex::open(&stores.dir_for(Modality::Image), Modality::Image)?;
        Self::new(text, caption, image)
    }

    pub fn index(&self, modality: Modality) -> &VectorIndex {
        match modality {
            Modality::Text => &self.text,
            Modality::Caption => &self.caption,
            Modality::Image => &self.image,
        }
    }

    pub fn search_by_vector(&self, modality: Modality, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.index(modality).search(vector, top_k)
    }

    pub fn search_text_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_by_vector(Modality::Text, vector, top_k)
    }

    pub fn search_caption_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_by_vector(Modality::Caption, vector, top_k)
    }

    pub fn search_image_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_by_vector(Modality::Image, vector, top_k)
    }

    /// Embed `query` and search the text index. Blank queries return no hits
    /// without calling the embedder.
    pub async fn search_text(&self, query: &str, embedder: &dyn TextEmbedder, top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_by_text(Modality::Text, query, embedder, top_k).await
    }

    /// Embed a caption and search the caption index. Blank captions return no hits.
    pub async fn search_caption(&self, caption: &str, embedder: &dyn TextEmbedder, top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_by_text(Modality::Caption, caption, embedder, top_k).await
    }

    /// Embed the image and search the image index. No image, no hits.
    pub async fn search_image(
        &self,
        image: Option<&QueryImage>,
        embedder: &dyn ImageEmbedder,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(image) = image else {
            return Ok(Vec::new());
        };
        let vector = embedder.embed_image(image).await?;
        self.search_image_by_vector(&vector, top_k)
    }

    async fn search_by_text(
        &self,
        modality: Modality,
        query: &str,
        embedder: &dyn TextEmbedder,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = embedder.embed_text(query).await?;
        self.search_by_vector(modality, &vector, top_k)
    }

    /// Text metadata in original order.
    pub fn text_metadata(&self) -> &[IndexRecord] {
        self.text.records()
    }

    /// Every text record for `plant_id`, in metadata order, with its position.
    pub fn plant_records<'a>(&'a self, plant_id: &'a str) -> impl Iterator<Item = (usize, &'a IndexRecord)> + 'a {
        self.text
            .records()
            .iter()
            .enumerate()
            .filter(move |(_, record)| record.plant_id.as_deref() == Some(plant_id))
    }

    pub fn stats(&self) -> [&IndexStats; 3] {
        [self.text.stats(), self.caption.stats(), self.image.stats()]
    }

    pub fn fingerprints(&self) -> [&str; 3] {
        [self.text.fingerprint(), self.caption.fingerprint(), self.image.fingerprint()]
    }
}
