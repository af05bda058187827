//! One read-only modality index: flat vectors plus aligned metadata.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use sap_core::error::{Error, Result};
use sap_core::types::{IndexRecord, Modality, SearchHit};

use crate::flat::{FlatIndex, Metric};
use crate::metadata::{parse_metadata, read_file, write_metadata};

pub const INDEX_FILE: &str = "index.faiss";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub modality: Modality,
    pub dim: usize,
    pub len: usize,
    pub metric: Metric,
    /// blake3 over the index file followed by the metadata file.
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct VectorIndex {
    modality: Modality,
    flat: FlatIndex,
    records: Vec<IndexRecord>,
    stats: IndexStats,
}

impl VectorIndex {
    /// Load `index.faiss` + `metadata.json` from `dir`.
    pub fn open(dir: &Path, modality: Modality) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        let index_bytes = read_file(&index_path)?;
        let metadata_bytes = read_file(&metadata_path)?;

        let flat = FlatIndex::decode(&index_bytes)
            .map_err(|e| in_file(e, &index_path))?;
        let records = parse_metadata(&metadata_bytes)
            .map_err(|e| in_file(e, &metadata_path))?;
        let fingerprint = fingerprint(&index_bytes, &metadata_bytes);
        Self::build(modality, flat, records, fingerprint, Some(dir.to_path_buf()))
    }

    /// Assemble an index from memory, applying the same alignment check as `open`.
    pub fn from_parts(modality: Modality, flat: FlatIndex, records: Vec<IndexRecord>) -> Result<Self> {
        let metadata = serde_json::to_vec(&records)
            .map_err(|e| Error::CorruptIndex(format!("failed to serialize metadata: {e}")))?;
        let fingerprint = fingerprint(&flat.encode(), &metadata);
        Self::build(modality, flat, records, fingerprint, None)
    }

    fn build(
        modality: Modality,
        flat: FlatIndex,
        records: Vec<IndexRecord>,
        fingerprint: String,
        dir: Option<PathBuf>,
    ) -> Result<Self> {
        if flat.len() != records.len() {
            return Err(Error::CorruptIndex(format!(
                "{modality} index holds {} vectors but its metadata has {} records",
                flat.len(),
                records.len()
            )));
        }
        let stats = IndexStats {
            modality,
            dim: flat.dim(),
            len: flat.len(),
            metric: flat.metric(),
            fingerprint,
            loaded_at: Utc::now(),
            dir,
        };
        tracing::info!(%modality, dim = stats.dim, len = stats.len, "vector index loaded");
        Ok(Self { modality, flat, records, stats })
    }

    /// Up to `top_k` hits by descending similarity. Empty slots are skipped.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
        }
        // slots past the stored vectors would only be padding
        let slots = top_k.min(self.flat.len().max(1));
        let neighbors = self.flat.search(query, slots)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for (rank, neighbor) in neighbors.into_iter().enumerate() {
            let Some((position, record)) = usize::try_from(neighbor.position)
                .ok()
                .and_then(|p| self.records.get(p).map(|r| (p, r)))
            else {
                continue;
            };
            hits.push(SearchHit::from_record(self.modality, position, record, neighbor.score, rank));
        }
        tracing::debug!(modality = %self.modality, top_k, hits = hits.len(), "index searched");
        Ok(hits)
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn dim(&self) -> usize {
        self.flat.dim()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Metadata in original (build) order.
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn fingerprint(&self) -> &str {
        &self.stats.fingerprint
    }
}

/// Fingerprint of a store directory without parsing it.
pub fn fingerprint_dir(dir: &Path) -> Result<String> {
    let index_bytes = read_file(&dir.join(INDEX_FILE))?;
    let metadata_bytes = read_file(&dir.join(METADATA_FILE))?;
    Ok(fingerprint(&index_bytes, &metadata_bytes))
}

/// Write a store directory in the layout `VectorIndex::open` reads.
pub fn write_store(dir: &Path, flat: &FlatIndex, records: &[IndexRecord]) -> Result<()> {
    if flat.len() != records.len() {
        return Err(Error::CorruptIndex(format!(
            "refusing to write {} vectors with {} metadata records",
            flat.len(),
            records.len()
        )));
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    flat.write(&dir.join(INDEX_FILE))?;
    write_metadata(&dir.join(METADATA_FILE), records)
}

fn fingerprint(index_bytes: &[u8], metadata_bytes: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(index_bytes);
    hasher.update(metadata_bytes);
    hasher.finalize().to_hex().to_string()
}

fn in_file(err: Error, path: &Path) -> Error {
    match err {
        Error::CorruptIndex(msg) => Error::CorruptIndex(format!("{}: {msg}", path.display())),
        other => other,
    }
}
