//! Domain types shared by the index, fusion and routing layers.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// A dense query or stored vector. Its length must equal the target index dimension.
pub type EmbeddingVector = Vec<f32>;

/// Source tag given to records pulled straight from the text metadata for an
/// identified plant.
pub const PLANT_METADATA_SOURCE: &str = "plant_metadata";

/// One evidence type, backed by one vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Caption,
    Image,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Caption, Modality::Image];

    /// Arm name used in fusion and default `source` tag for hits.
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Caption => "caption",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metadata entry, positionally aligned with vector `i` of its index.
///
/// The well-known fields are typed; anything else the index builder wrote is
/// kept in `extra` so arm-specific fields survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(default, deserialize_with = "de_opt_label", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de_opt_label", skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IndexRecord {
    /// `plant_id`, ignoring empty or whitespace-only strings.
    pub fn plant_id(&self) -> Option<&str> {
        non_empty(self.plant_id.as_deref())
    }

    /// `plant_name`, ignoring empty or whitespace-only strings.
    pub fn plant_name(&self) -> Option<&str> {
        non_empty(self.plant_name.as_deref())
    }

    pub fn carries_plant(&self) -> bool {
        self.plant_id().is_some() || self.plant_name().is_some()
    }

    /// Best human-readable payload: text, then plant name, then image path.
    pub fn display_text(&self) -> &str {
        non_empty(self.text.as_deref())
            .or_else(|| self.plant_name())
            .or_else(|| non_empty(self.image_path.as_deref()))
            .unwrap_or("")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// Index builders wrote ids both as strings and as bare numbers.
fn de_opt_label<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a string or number label, found {other}"))),
    }
}

/// A record returned by one index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record id, or `"{modality}_{position}"` when the metadata has none.
    pub id: String,
    /// Record source tag, or the modality name when the metadata has none.
    pub source: String,
    pub modality: Modality,
    /// Row of the vector inside its index.
    pub position: usize,
    /// Raw score reported by the index (inner product for IP indices).
    pub similarity_distance: f32,
    /// 0-based position within this single-index result list.
    pub rank: usize,
    pub record: IndexRecord,
}

impl SearchHit {
    pub fn from_record(
        modality: Modality,
        position: usize,
        record: &IndexRecord,
        similarity_distance: f32,
        rank: usize,
    ) -> Self {
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", modality.as_str(), position));
        let source = record.source.clone().unwrap_or_else(|| modality.as_str().to_string());
        Self { id, source, modality, position, similarity_distance, rank, record: record.clone() }
    }

    /// Composite `source::id` key used to deduplicate across arms.
    pub fn fusion_key(&self) -> String {
        format!("{}::{}", self.source, self.id)
    }
}

/// A deduplicated hit after reciprocal-rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedItem {
    pub hit: SearchHit,
    pub rrf_score: f64,
    /// Arms that contributed, in first-seen order.
    pub from_arm: Vec<String>,
}

impl FusedItem {
    pub fn key(&self) -> String {
        self.hit.fusion_key()
    }

    pub fn plant_id(&self) -> Option<&str> {
        self.hit.record.plant_id()
    }

    pub fn plant_name(&self) -> Option<&str> {
        self.hit.record.plant_name()
    }
}

/// Route chosen for a request. Selected once from the inputs present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteMode {
    #[serde(rename = "text")]
    TextOnly,
    #[serde(rename = "image")]
    ImageOnly,
    #[serde(rename = "image+text")]
    ImageAndText,
}

impl RouteMode {
    pub fn select(has_text: bool, has_image: bool) -> Result<Self> {
        match (has_text, has_image) {
            (true, true) => Ok(RouteMode::ImageAndText),
            (false, true) => Ok(RouteMode::ImageOnly),
            (true, false) => Ok(RouteMode::TextOnly),
            (false, false) => Err(Error::InvalidQuery("provide text and/or an image".to_string())),
        }
    }

    pub fn uses_image(self) -> bool {
        !matches!(self, RouteMode::TextOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteMode::TextOnly => "text",
            RouteMode::ImageOnly => "image",
            RouteMode::ImageAndText => "image+text",
        }
    }
}

impl fmt::Display for RouteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the router hands back for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub mode: RouteMode,
    pub generated_caption: Option<String>,
    pub fused_ranked: Vec<FusedItem>,
    pub identified_plant: Option<FusedItem>,
}

impl RouteOutcome {
    /// The request completed but nothing grounded it.
    pub fn no_evidence_found(&self) -> bool {
        self.fused_ranked.is_empty() && self.identified_plant.is_none()
    }
}

/// Encoded image bytes as received from the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryImage(Vec<u8>);

impl QueryImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for QueryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryImage({} bytes)", self.0.len())
    }
}

/// Caller input for one routed request.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub text: Option<String>,
    pub image: Option<QueryImage>,
}

impl Query {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), image: None }
    }

    pub fn image(image: QueryImage) -> Self {
        Self { text: None, image: Some(image) }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_image(mut self, image: QueryImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Text with surrounding whitespace removed, `None` when nothing is left.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accepts_numeric_ids_and_keeps_extras() {
        let json = r#"{"id": 12, "plant_id": 7, "plant_name": "Tulsi", "page": 3, "habitat": "terai"}"#;
        let record: IndexRecord = serde_json::from_str(json).expect("parse record");
        assert_eq!(record.id.as_deref(), Some("12"));
        assert_eq!(record.plant_id(), Some("7"));
        assert_eq!(record.page, Some(3));
        assert_eq!(record.extra.get("habitat"), Some(&serde_json::json!("terai")));
    }

    #[test]
    fn hit_defaults_id_and_source_from_modality() {
        let record = IndexRecord { image_path: Some("data/images/a.jpg".into()), ..Default::default() };
        let hit = SearchHit::from_record(Modality::Image, 4, &record, 0.9, 0);
        assert_eq!(hit.id, "image_4");
        assert_eq!(hit.source, "image");
        assert_eq!(hit.fusion_key(), "image::image_4");
    }

    #[test]
    fn empty_plant_fields_do_not_count() {
        let record = IndexRecord { plant_id: Some(String::new()), plant_name: Some("  ".into()), ..Default::default() };
        assert!(!record.carries_plant());
        let blank_id = IndexRecord { plant_id: Some(" \t".into()), ..Default::default() };
        assert_eq!(blank_id.plant_id(), None);
    }

    #[test]
    fn route_mode_selection() {
        assert_eq!(RouteMode::select(true, false).expect("text"), RouteMode::TextOnly);
        assert_eq!(RouteMode::select(false, true).expect("image"), RouteMode::ImageOnly);
        assert_eq!(RouteMode::select(true, true).expect("both"), RouteMode::ImageAndText);
        assert!(matches!(RouteMode::select(false, false), Err(Error::InvalidQuery(_))));
        assert_eq!(serde_json::to_string(&RouteMode::ImageAndText).expect("json"), "\"image+text\"");
    }

    #[test]
    fn whitespace_text_is_not_text() {
        assert_eq!(Query::text("   \n").trimmed_text(), None);
        assert_eq!(Query::text("  neem ").trimmed_text(), Some("neem"));
    }
}
