use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use sap_core::error::{Error, Result};
use sap_core::types::IndexRecord;

/// Parse a `metadata.json` array. Record `i` describes vector `i`.
pub fn parse_metadata(bytes: &[u8]) -> Result<Vec<IndexRecord>> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::CorruptIndex(format!("metadata is not a JSON array of records: {e}")))
}

pub fn load_metadata(path: &Path) -> Result<Vec<IndexRecord>> {
    parse_metadata(&read_file(path)?)
}

pub fn write_metadata(path: &Path, records: &[IndexRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .map_err(|e| Error::CorruptIndex(format!("failed to serialize metadata: {e}")))?;
    fs::write(path, json).map_err(|e| Error::io(path, e))
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::io(path, e),
    })
}
