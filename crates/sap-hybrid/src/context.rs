//! Deterministic text rendering of a route outcome for the chat model, plus
//! the trimmed item list returned to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sap_core::types::{FusedItem, RouteOutcome, PLANT_METADATA_SOURCE};

pub const NO_CONTEXT: &str = "No retrieved context.";

/// One evidence item as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub id: String,
    pub source: String,
    pub text: String,
    /// Raw index score; 0 for plant metadata records.
    pub score: f32,
    pub rrf_score: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl From<&FusedItem> for RetrievedItem {
    fn from(item: &FusedItem) -> Self {
        let mut extra = match serde_json::to_value(&item.hit.record) {
            Ok(Value::Object(map)) => map.into_iter().collect::<BTreeMap<_, _>>(),
            _ => BTreeMap::new(),
        };
        extra.remove("id");
        extra.remove("source");
        extra.insert("modality".to_string(), Value::from(item.hit.modality.as_str()));
        extra.insert("rank".to_string(), Value::from(item.hit.rank));
        extra.insert("from_arm".to_string(), Value::from(item.from_arm.clone()));
        Self {
            id: item.hit.id.clone(),
            source: item.hit.source.clone(),
            text: item.hit.record.display_text().to_string(),
            score: item.hit.similarity_distance,
            rrf_score: item.rrf_score,
            extra,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceContext {
    caption: Option<String>,
    candidate: Option<FusedItem>,
    blocks: Vec<String>,
    retrieved: Vec<RetrievedItem>,
}

impl EvidenceContext {
    /// Uses the top `max_items` fused items. The plant candidate is the
    /// identified plant, else the first plant-metadata item anywhere in the list.
    pub fn build(outcome: &RouteOutcome, max_items: usize) -> Self {
        let candidate = outcome.identified_plant.clone().or_else(|| {
            outcome
                .fused_ranked
                .iter()
                .find(|item| item.hit.source == PLANT_METADATA_SOURCE)
                .cloned()
        });
        let top = &outcome.fused_ranked[..outcome.fused_ranked.len().min(max_items)];

        let mut blocks = Vec::with_capacity(top.len() + 1);
        if let Some(plant) = &candidate {
            blocks.push(format!(
                "Identified plant candidate: {}\nPlant details: {}",
                candidate_name(plant),
                plant.hit.record.display_text()
            ));
        }
        for (n, item) in top.iter().enumerate() {
            if candidate.as_ref() == Some(item) {
                continue;
            }
            blocks.push(format!("[{}] ({}) {}", n + 1, item.hit.source, item.hit.record.display_text()));
        }

        Self {
            caption: outcome.generated_caption.clone(),
            candidate,
            blocks,
            retrieved: top.iter().map(RetrievedItem::from).collect(),
        }
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn candidate(&self) -> Option<&FusedItem> {
        self.candidate.as_ref()
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.candidate.as_ref().map(candidate_name)
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn retrieved(&self) -> &[RetrievedItem] {
        &self.retrieved
    }

    pub fn into_retrieved(self) -> Vec<RetrievedItem> {
        self.retrieved
    }

    pub fn render(&self) -> String {
        if self.blocks.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            self.blocks.join("\n\n")
        }
    }
}

fn candidate_name(item: &FusedItem) -> &str {
    let record = &item.hit.record;
    record
        .plant_name()
        .or_else(|| record.extra.get("name").and_then(Value::as_str).filter(|n| !n.trim().is_empty()))
        .or_else(|| record.plant_id())
        .unwrap_or("Unknown")
}
