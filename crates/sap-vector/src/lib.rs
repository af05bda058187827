//! Read-only flat vector indices for the text, caption and image stores, and
//! the retriever that owns them.

pub mod flat;
pub mod index;
pub mod metadata;
pub mod retriever;
pub mod shared;

pub use flat::{FlatIndex, Metric, Neighbor};
pub use index::{fingerprint_dir, write_store, IndexStats, VectorIndex, INDEX_FILE, METADATA_FILE};
pub use metadata::{load_metadata, parse_metadata, write_metadata};
pub use retriever::Retriever;
pub use shared::{ReloadOutcome, SharedRetriever};
