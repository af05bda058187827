//! Reciprocal Rank Fusion over named result lists ("arms").
//!
//! Every hit at 0-based position `r` of an arm contributes `1 / (k + r + 1)`
//! to the item keyed by `source::id`. Contributions add up across arms, so an
//! item several arms agree on can outrank one that tops a single arm.

use std::collections::HashMap;

use sap_core::types::{FusedItem, SearchHit};

pub const DEFAULT_K_RRF: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrfFusion {
    k_rrf: u32,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self::new(DEFAULT_K_RRF)
    }
}

impl RrfFusion {
    pub fn new(k_rrf: u32) -> Self {
        Self { k_rrf }
    }

    pub fn k_rrf(&self) -> u32 {
        self.k_rrf
    }

    /// Score contributed by a hit at 0-based position `rank`.
    pub fn contribution(&self, rank: usize) -> f64 {
        1.0 / (f64::from(self.k_rrf) + rank as f64 + 1.0)
    }

    /// Merge arms in the given order. The first occurrence of a key keeps its
    /// payload; later ones only add score and record their arm. Output is
    /// sorted by score descending, ties in first-seen order. Nothing is dropped.
    pub fn fuse(&self, arms: &[(&str, Vec<SearchHit>)]) -> Vec<FusedItem> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut fused: Vec<FusedItem> = Vec::new();

        for (arm, hits) in arms {
            for (rank, hit) in hits.iter().enumerate() {
                let contribution = self.contribution(rank);
                let key = hit.fusion_key();
                match slots.get(&key) {
                    Some(&slot) => {
                        let item = &mut fused[slot];
                        item.rrf_score += contribution;
                        item.from_arm.push((*arm).to_string());
                    }
                    None => {
                        slots.insert(key, fused.len());
                        fused.push(FusedItem {
                            hit: hit.clone(),
                            rrf_score: contribution,
                            from_arm: vec![(*arm).to_string()],
                        });
                    }
                }
            }
        }

        // sort_by is stable: equal scores stay in insertion order
        fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sap_core::types::{IndexRecord, Modality};

    fn hit(source: &str, id: &str, rank: usize) -> SearchHit {
        let record = IndexRecord {
            id: Some(id.to_string()),
            source: Some(source.to_string()),
            ..Default::default()
        };
        SearchHit::from_record(Modality::Text, rank, &record, 1.0, rank)
    }

    fn keys(items: &[FusedItem]) -> Vec<String> {
        items.iter().map(FusedItem::key).collect()
    }

    #[test]
    fn single_arm_scores_are_exact() {
        let fused = RrfFusion::default().fuse(&[("text", vec![hit("text", "plant_7", 0), hit("text", "plant_8", 1)])]);
        assert_eq!(fused[0].rrf_score, 1.0 / 61.0);
        assert_eq!(fused[1].rrf_score, 1.0 / 62.0);
        assert_eq!(fused[0].from_arm, vec!["text"]);
    }

    #[test]
    fn shared_items_sum_and_record_arms_in_order() {
        let fusion = RrfFusion::default();
        let fused = fusion.fuse(&[
            ("image", vec![hit("img", "a", 0), hit("img", "b", 1)]),
            ("caption", vec![hit("img", "b", 0), hit("cap", "c", 1)]),
        ]);
        assert_eq!(keys(&fused), vec!["img::b", "img::a", "cap::c"]);
        assert_eq!(fused[0].rrf_score, 1.0 / 62.0 + 1.0 / 61.0);
        assert_eq!(fused[0].from_arm, vec!["image", "caption"]);
    }

    #[test]
    fn keys_are_unique_and_scores_descend() {
        let fused = RrfFusion::new(10).fuse(&[
            ("a", vec![hit("s", "1", 0), hit("s", "2", 1), hit("s", "3", 2)]),
            ("b", vec![hit("s", "3", 0), hit("t", "1", 1)]),
            ("c", vec![hit("s", "2", 0)]),
        ]);
        let mut seen = keys(&fused);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), fused.len());
        assert!(fused.windows(2).all(|w| w[0].rrf_score >= w[1].rrf_score));
    }

    #[test]
    fn equal_scores_keep_first_seen_order() {
        let fused = RrfFusion::default().fuse(&[
            ("image", vec![hit("img", "x", 0)]),
            ("caption", vec![hit("cap", "y", 0)]),
        ]);
        assert_eq!(keys(&fused), vec!["img::x", "cap::y"]);
    }

    #[test]
    fn agreement_beats_a_single_top_hit() {
        let fused = RrfFusion::default().fuse(&[
            ("a", vec![hit("s", "solo", 0), hit("s", "shared", 3)]),
            ("b", vec![hit("s", "other", 0), hit("s", "shared", 3)]),
            ("c", vec![hit("s", "third", 0), hit("s", "shared", 3)]),
        ]);
        assert_eq!(fused[0].key(), "s::shared");
        assert_eq!(fused[0].from_arm.len(), 3);
    }

    #[test]
    fn duplicates_within_one_arm_accumulate() {
        let fused = RrfFusion::default().fuse(&[("text", vec![hit("s", "a", 0), hit("s", "a", 1)])]);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].from_arm, vec!["text", "text"]);
        assert_eq!(fused[0].rrf_score, 1.0 / 61.0 + 1.0 / 62.0);
    }

    #[test]
    fn first_occurrence_keeps_its_payload() {
        let mut later = hit("s", "a", 0);
        later.similarity_distance = 0.1;
        let fused = RrfFusion::default().fuse(&[("x", vec![hit("s", "a", 0)]), ("y", vec![later])]);
        assert_eq!(fused[0].hit.similarity_distance, 1.0);
    }

    #[test]
    fn empty_arms_fuse_to_nothing() {
        assert!(RrfFusion::default().fuse(&[("text", Vec::new())]).is_empty());
        assert!(RrfFusion::default().fuse(&[]).is_empty());
    }
}
