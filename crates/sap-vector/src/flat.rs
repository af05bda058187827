//! Exhaustive vector index stored in the FAISS `IndexFlat` file layout.
//!
//! Layout (little-endian), as produced by `faiss.write_index` for
//! `IndexFlatIP` / `IndexFlatL2`:
//!
//! ```text
//! fourcc        [u8; 4]   "IxFI" (inner product) | "IxF2" (L2)
//! d             i32
//! ntotal        i64
//! reserved      i64 x 2
//! is_trained    u8
//! metric_type   i32       0 = inner product, 1 = L2
//! n_floats      u64       == ntotal * d
//! vectors       f32 x n_floats, row-major
//! ```

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::Serialize;

use sap_core::error::{Error, Result};

const FOURCC_IP: [u8; 4] = *b"IxFI";
const FOURCC_L2: [u8; 4] = *b"IxF2";
const RESERVED_WORD: i64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    InnerProduct,
    L2,
}

impl Metric {
    fn code(self) -> i32 {
        match self {
            Metric::InnerProduct => 0,
            Metric::L2 => 1,
        }
    }

    fn fourcc(self) -> [u8; 4] {
        match self {
            Metric::InnerProduct => FOURCC_IP,
            Metric::L2 => FOURCC_L2,
        }
    }

    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            // squared distance, as FAISS reports it
            Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }

    /// Best-first ordering of two scores.
    fn compare(self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::InnerProduct => b.total_cmp(&a),
            Metric::L2 => a.total_cmp(&b),
        }
    }

    /// Score reported for empty result slots.
    fn sentinel(self) -> f32 {
        match self {
            Metric::InnerProduct => f32::MIN,
            Metric::L2 => f32::MAX,
        }
    }
}

/// One result slot. `position` is `-1` when the index had fewer than `top_k` vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: i64,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Empty index. `dim` must be at least 1.
    pub fn new(dim: usize, metric: Metric) -> Result<Self> {
        if dim == 0 {
            return Err(Error::CorruptIndex("index dimension must be at least 1".to_string()));
        }
        Ok(Self { dim, metric, data: Vec::new() })
    }

    pub fn from_vectors(dim: usize, metric: Metric, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim, metric)?;
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Exactly `top_k` slots, best first, ties broken by insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
        }

        let metric = self.metric;
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, v)| (i, metric.score(query, v)))
            .collect();
        let order = |a: &(usize, f32), b: &(usize, f32)| metric.compare(a.1, b.1).then(a.0.cmp(&b.0));
        if top_k < scored.len() {
            scored.select_nth_unstable_by(top_k - 1, order);
            scored.truncate(top_k);
        }
        scored.sort_by(order);

        let mut neighbors: Vec<Neighbor> = scored
            .into_iter()
            .map(|(i, score)| Neighbor { position: i as i64, score })
            .collect();
        neighbors.resize(top_k, Neighbor { position: -1, score: metric.sentinel() });
        Ok(neighbors)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let fourcc: [u8; 4] = r.array("fourcc")?;
        let declared = match fourcc {
            FOURCC_IP => Metric::InnerProduct,
            FOURCC_L2 => Metric::L2,
            other => {
                return Err(Error::CorruptIndex(format!(
                    "unsupported index type '{}', expected a flat index",
                    String::from_utf8_lossy(&other)
                )))
            }
        };
        let dim = r.i32("dimension")?;
        let ntotal = r.i64("vector count")?;
        let (dim, ntotal) = match (usize::try_from(dim), usize::try_from(ntotal)) {
            (Ok(d), Ok(n)) if d > 0 => (d, n),
            _ => return Err(Error::CorruptIndex(format!("invalid header: d={dim}, ntotal={ntotal}"))),
        };
        r.i64("reserved")?;
        r.i64("reserved")?;
        r.u8("is_trained")?;
        let metric = match r.i32("metric type")? {
            0 => Metric::InnerProduct,
            1 => Metric::L2,
            other => return Err(Error::CorruptIndex(format!("unsupported metric type {other}"))),
        };
        if metric != declared {
            return Err(Error::CorruptIndex(format!(
                "header says {declared:?} but metric field says {metric:?}"
            )));
        }
        let n_floats = r.u64("payload length")?;
        let expected = ntotal
            .checked_mul(dim)
            .ok_or_else(|| Error::CorruptIndex("vector payload size overflows".to_string()))?;
        if usize::try_from(n_floats).ok() != Some(expected) {
            return Err(Error::CorruptIndex(format!(
                "payload holds {n_floats} floats, expected {ntotal} x {dim}"
            )));
        }
        let payload = r.take(expected * 4, "vectors")?;
        if r.remaining() != 0 {
            return Err(Error::CorruptIndex(format!("{} trailing bytes after vectors", r.remaining())));
        }
        let data = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dim, metric, data })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(45 + self.data.len() * 4);
        out.extend_from_slice(&self.metric.fourcc());
        out.extend_from_slice(&(self.dim as i32).to_le_bytes());
        out.extend_from_slice(&(self.len() as i64).to_le_bytes());
        out.extend_from_slice(&RESERVED_WORD.to_le_bytes());
        out.extend_from_slice(&RESERVED_WORD.to_le_bytes());
        out.push(1);
        out.extend_from_slice(&self.metric.code().to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
        out
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::decode(&bytes)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.encode()).map_err(|e| Error::io(path, e))
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::CorruptIndex(format!("truncated while reading {what} at byte {}", self.pos)))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array(what)?))
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(what)?))
    }
}
