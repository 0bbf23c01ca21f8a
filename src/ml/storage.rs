//! Model bundle persistence.
//!
//! A bundle is a tar.gz archive with two entries:
//! - metadata.json   - class names, input size and training parameters
//! - model.bin       - model weights (full precision record bytes)

use crate::error::{Error, Result};
use crate::ml::TrainOptions;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder};

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Output index -> label, in training order.
    pub class_names: Vec<String>,
    /// Square input side length the model was trained on.
    pub image_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub seed: u64,
    /// RFC 3339
    pub trained_at: String,
}

impl ModelMetadata {
    pub fn new(class_names: Vec<String>, options: &TrainOptions) -> Self {
        Self {
            class_names,
            image_size: options.image_size,
            epochs: options.epochs,
            batch_size: options.batch_size,
            validation_split: options.validation_split,
            seed: options.seed,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Write `metadata` and `model_binary` into a single tar.gz at `path`.
pub fn save_bundle(path: &Path, metadata: &ModelMetadata, model_binary: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_fatal(parent, e))?;
    }

    let file = File::create(path).map_err(|e| Error::io_fatal(path, e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let json = serde_json::to_vec_pretty(metadata)
        .map_err(|e| Error::Model(format!("could not serialize metadata: {}", e)))?;

    append(&mut builder, METADATA_ENTRY, &json).map_err(|e| Error::io_fatal(path, e))?;
    append(&mut builder, MODEL_ENTRY, model_binary).map_err(|e| Error::io_fatal(path, e))?;

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| Error::io_fatal(path, e))?;
    Ok(())
}

fn append<W: std::io::Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, data)
}

/// Read metadata and weights back from a bundle.
pub fn load_bundle(path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let file = File::open(path).map_err(|e| {
        Error::Model(format!(
            "could not open model bundle {}: {} (train one first with --train)",
            path.display(),
            e
        ))
    })?;
    let corrupt = |e: std::io::Error| Error::Model(format!("{}: {}", path.display(), e));

    let mut archive = Archive::new(GzDecoder::new(file));
    let mut metadata = None;
    let mut model_binary = None;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();

        match name.as_str() {
            METADATA_ENTRY => {
                let mut json = String::new();
                entry.read_to_string(&mut json).map_err(corrupt)?;
                let parsed: ModelMetadata = serde_json::from_str(&json)
                    .map_err(|e| Error::Model(format!("invalid {}: {}", METADATA_ENTRY, e)))?;
                metadata = Some(parsed);
            }
            MODEL_ENTRY => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer).map_err(corrupt)?;
                model_binary = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata, model_binary) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(Error::Model(format!("{} not found in {}", METADATA_ENTRY, path.display()))),
        (_, None) => Err(Error::Model(format!("{} not found in {}", MODEL_ENTRY, path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TrainOptions {
        TrainOptions {
            image_size: 64,
            batch_size: 8,
            validation_split: 0.25,
            seed: 7,
            epochs: 3,
        }
    }

    #[test]
    fn test_bundle_keeps_metadata_and_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("models/photos.tar.gz");
        let metadata = ModelMetadata::new(vec!["beach".into(), "city".into()], &options());

        save_bundle(&path, &metadata, &[1, 2, 3, 4]).unwrap();
        let (loaded, binary) = load_bundle(&path).unwrap();

        assert_eq!(loaded, metadata);
        assert_eq!(binary, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_bundle_is_a_model_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_bundle(&tmp.path().join("nope.tar.gz")).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert!(err.to_string().contains("--train"));
    }

    #[test]
    fn test_garbage_bundle_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.tar.gz");
        std::fs::write(&path, b"this is not gzip").unwrap();

        assert!(matches!(load_bundle(&path), Err(Error::Model(_))));
    }
}
