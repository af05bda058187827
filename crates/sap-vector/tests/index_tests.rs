use std::fs;

use sap_core::error::Error;
use sap_core::types::{IndexRecord, Modality};
use sap_vector::{write_store, FlatIndex, Metric, VectorIndex, INDEX_FILE, METADATA_FILE};

fn record(id: &str, plant_id: &str, text: &str) -> IndexRecord {
    IndexRecord {
        id: Some(id.to_string()),
        plant_id: Some(plant_id.to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

fn unit_vectors() -> Vec<Vec<f32>> {
    vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]
}

#[test]
fn open_and_search_written_store() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("text_faiss");
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let records = vec![record("a", "1", "neem"), record("b", "2", "tulsi"), record("c", "3", "ashwagandha")];
    write_store(&dir, &flat, &records)?;

    let index = VectorIndex::open(&dir, Modality::Text)?;
    assert_eq!(index.dim(), 3);
    assert_eq!(index.len(), 3);
    assert_eq!(index.stats().dir.as_deref(), Some(dir.as_path()));

    let hits = index.search(&[0.1, 0.9, 0.0], 2)?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "b");
    assert_eq!(hits[0].rank, 0);
    assert_eq!(hits[0].position, 1);
    assert!((hits[0].similarity_distance - 0.9).abs() < 1e-6);
    assert_eq!(hits[1].id, "a");
    assert_eq!(hits[1].rank, 1);
    Ok(())
}

#[test]
fn top_k_beyond_size_skips_empty_slots() -> anyhow::Result<()> {
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors()[..2])?;
    let index = VectorIndex::from_parts(Modality::Caption, flat, vec![record("a", "1", "x"), record("b", "2", "y")])?;
    let hits = index.search(&[1.0, 0.0, 0.0], 10)?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![0, 1]);
    Ok(())
}

#[test]
fn missing_ids_and_sources_default_to_modality() -> anyhow::Result<()> {
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let records = vec![IndexRecord::default(); 3];
    let index = VectorIndex::from_parts(Modality::Image, flat, records)?;
    let hits = index.search(&[0.0, 0.0, 1.0], 1)?;
    assert_eq!(hits[0].id, "image_2");
    assert_eq!(hits[0].source, "image");
    Ok(())
}

#[test]
fn vector_and_record_counts_must_agree() -> anyhow::Result<()> {
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let err = VectorIndex::from_parts(Modality::Text, flat, vec![record("a", "1", "x")]).expect_err("misaligned");
    assert!(matches!(err, Error::CorruptIndex(_)));
    Ok(())
}

#[test]
fn misaligned_store_on_disk_is_corrupt() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path();
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    flat.write(&dir.join(INDEX_FILE))?;
    fs::write(dir.join(METADATA_FILE), r#"[{"id": "only"}]"#)?;
    let err = VectorIndex::open(dir, Modality::Text).expect_err("misaligned");
    assert!(matches!(err, Error::CorruptIndex(_)));
    Ok(())
}

#[test]
fn metadata_that_is_not_an_array_is_corrupt() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path();
    FlatIndex::new(3, Metric::InnerProduct)?.write(&dir.join(INDEX_FILE))?;
    fs::write(dir.join(METADATA_FILE), r#"{"records": []}"#)?;
    let err = VectorIndex::open(dir, Modality::Text).expect_err("object metadata");
    assert!(matches!(err, Error::CorruptIndex(msg) if msg.contains(METADATA_FILE)));
    Ok(())
}

#[test]
fn missing_store_files_are_not_found() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let err = VectorIndex::open(&tmp.path().join("nope"), Modality::Text).expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)));
    Ok(())
}

#[test]
fn wrong_query_dimension_is_rejected() -> anyhow::Result<()> {
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let index = VectorIndex::from_parts(Modality::Text, flat, vec![IndexRecord::default(); 3])?;
    let err = index.search(&[1.0, 0.0], 1).expect_err("short query");
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    Ok(())
}

#[test]
fn empty_index_returns_no_hits() -> anyhow::Result<()> {
    let index = VectorIndex::from_parts(Modality::Text, FlatIndex::new(3, Metric::InnerProduct)?, Vec::new())?;
    assert!(index.is_empty());
    assert!(index.search(&[1.0, 0.0, 0.0], 5)?.is_empty());
    Ok(())
}

#[test]
fn oversized_top_k_returns_every_vector() -> anyhow::Result<()> {
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let records = vec![record("a", "1", "x"), record("b", "2", "y"), record("c", "3", "z")];
    let index = VectorIndex::from_parts(Modality::Text, flat, records)?;
    let hits = index.search(&[0.0, 0.0, 1.0], usize::MAX)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "c");
    assert!(matches!(index.search(&[0.0, 0.0, 1.0], 0), Err(Error::InvalidQuery(_))));
    Ok(())
}

#[test]
fn write_store_refuses_misaligned_input() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let flat = FlatIndex::from_vectors(3, Metric::InnerProduct, &unit_vectors())?;
    let err = write_store(tmp.path(), &flat, &[]).expect_err("misaligned");
    assert!(matches!(err, Error::CorruptIndex(_)));
    Ok(())
}
