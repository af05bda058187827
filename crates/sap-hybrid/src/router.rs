//! Modality routing.
//!
//! A text-only request is a single search plus one-arm fusion. An image
//! request runs two stages: `IdentifyPlant` fuses image and caption evidence
//! only to pick a plant key, then `CollectEvidence` returns every text record
//! for that plant in metadata order.

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use sap_core::config::RetrievalConfig;
use sap_core::error::Result;
use sap_core::types::{
    FusedItem, Modality, Query, QueryImage, RouteMode, RouteOutcome, SearchHit, PLANT_METADATA_SOURCE,
};
use sap_providers::ProviderSet;
use sap_vector::{Retriever, SharedRetriever};

use crate::fusion::{RrfFusion, DEFAULT_K_RRF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    pub top_k: usize,
    pub k_rrf: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self { top_k: 5, k_rrf: DEFAULT_K_RRF }
    }
}

impl From<&RetrievalConfig> for RouterSettings {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self { top_k: cfg.top_k, k_rrf: cfg.k_rrf }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    IdentifyPlant,
    CollectEvidence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::IdentifyPlant => "identify_plant",
            Stage::CollectEvidence => "collect_evidence",
        })
    }
}

/// Result of the identification stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub caption: String,
    /// `plant_id` of the first fused item naming a plant. May be absent even
    /// when that item only carried a `plant_name`.
    pub plant_id: Option<String>,
}

pub struct QueryRouter {
    retriever: Arc<SharedRetriever>,
    providers: ProviderSet,
    settings: RouterSettings,
    fusion: RrfFusion,
}

impl QueryRouter {
    pub fn new(retriever: Arc<SharedRetriever>, providers: ProviderSet, settings: RouterSettings) -> Self {
        let fusion = RrfFusion::new(settings.k_rrf);
        Self { retriever, providers, settings, fusion }
    }

    pub fn settings(&self) -> RouterSettings {
        self.settings
    }

    pub async fn handle_query(&self, query: &Query) -> Result<RouteOutcome> {
        let mode = RouteMode::select(query.trimmed_text().is_some(), query.image.is_some())?;
        let span = tracing::info_span!("route", %mode, top_k = self.settings.top_k);

        self.route(query, mode).instrument(span).await
    }

    async fn route(&self, query: &Query, mode: RouteMode) -> Result<RouteOutcome> {
        // one snapshot per request, so a reload never splits a request
        let retriever = self.retriever.snapshot();
        let outcome = match query.image.as_ref() {
            Some(image) => self.route_image(&retriever, mode, image).await?,
            None => self.route_text(&retriever, query.trimmed_text().unwrap_or_default()).await?,
        };
        if outcome.no_evidence_found() {
            tracing::info!("no evidence found");
        } else {
            tracing::debug!(items = outcome.fused_ranked.len(), "request routed");
        }
        Ok(outcome)
    }

    async fn route_text(&self, retriever: &Retriever, text: &str) -> Result<RouteOutcome> {
        let hits = retriever.search_text(text, &*self.providers.text, self.settings.top_k).await?;
        let fused_ranked = self.fusion.fuse(&[(Modality::Text.as_str(), hits)]);
        Ok(RouteOutcome { mode: RouteMode::TextOnly, generated_caption: None, fused_ranked, identified_plant: None })
    }

    async fn route_image(&self, retriever: &Retriever, mode: RouteMode, image: &QueryImage) -> Result<RouteOutcome> {
        tracing::debug!(stage = %Stage::IdentifyPlant, bytes = image.len(), "stage started");
        let identification = self.identify_plant(retriever, image).await?;

        let Some(plant_id) = identification.plant_id else {
            return Ok(RouteOutcome {
                mode,
                generated_caption: Some(identification.caption),
                fused_ranked: Vec::new(),
                identified_plant: None,
            });
        };

        tracing::debug!(stage = %Stage::CollectEvidence, plant_id = %plant_id, "stage started");
        let fused_ranked = collect_evidence(retriever, &plant_id);
        let identified_plant = fused_ranked.first().cloned();
        Ok(RouteOutcome { mode, generated_caption: Some(identification.caption), fused_ranked, identified_plant })
    }

    /// Caption and embed the image, search the image and caption indices and
    /// fuse them to find the plant the image most likely shows.
    pub async fn identify_plant(&self, retriever: &Retriever, image: &QueryImage) -> Result<Identification> {
        let top_k = self.settings.top_k;
        let (caption, image_hits) = tokio::try_join!(
            self.providers.captioner.caption(image),
            retriever.search_image(Some(image), &*self.providers.image, top_k),
        )?;
        let caption_hits = retriever.search_caption(&caption, &*self.providers.text, top_k).await?;

        let ranking = self.fusion.fuse(&[
            (Modality::Image.as_str(), image_hits),
            (Modality::Caption.as_str(), caption_hits),
        ]);
        let plant_id = ranking
            .iter()
            .find(|item| item.hit.record.carries_plant())
            .and_then(|item| item.plant_id().map(str::to_string));
        tracing::debug!(candidates = ranking.len(), plant_id = ?plant_id, "identification fused");
        Ok(Identification { caption, plant_id })
    }
}

/// Every text record for `plant_id` as a fused item, in metadata order.
pub fn collect_evidence(retriever: &Retriever, plant_id: &str) -> Vec<FusedItem> {
    retriever
        .plant_records(plant_id)
        .map(|(position, record)| {
            let hit = SearchHit {
                id: record.id.clone().unwrap_or_else(|| format!("plant_{plant_id}")),
                source: record.source.clone().unwrap_or_else(|| PLANT_METADATA_SOURCE.to_string()),
                modality: Modality::Text,
                position,
                similarity_distance: 0.0,
                rank: 0,
                record: record.clone(),
            };
            FusedItem { hit, rrf_score: 0.0, from_arm: vec![PLANT_METADATA_SOURCE.to_string()] }
        })
        .collect()
}
