use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::ml::storage::{self, ModelMetadata};
use crate::ml::training::argmax;
use crate::ml::{load_and_normalize_image, CpuBackend, ModelConfig, PhotoClassifier, MIN_IMAGE_SIZE};
use burn::{
    backend::ndarray::NdArrayDevice,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, Tensor},
};
use std::path::Path;
use tracing::debug;

/// A trained model ready to label photos.
pub struct InferenceEngine {
    model: PhotoClassifier<CpuBackend>,
    metadata: ModelMetadata,
    device: NdArrayDevice,
}

impl InferenceEngine {
    pub fn new(model: PhotoClassifier<CpuBackend>, metadata: ModelMetadata) -> Self {
        Self {
            model,
            metadata,
            device: NdArrayDevice::Cpu,
        }
    }

    /// Load a model bundle written by [`InferenceEngine::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let (metadata, model_binary) = storage::load_bundle(path)?;
        if metadata.class_names.is_empty() {
            return Err(Error::Model(format!("{} has no class names", path.display())));
        }
        if metadata.image_size < MIN_IMAGE_SIZE {
            return Err(Error::Model(format!(
                "{} has image size {}, at least {} is required",
                path.display(),
                metadata.image_size,
                MIN_IMAGE_SIZE
            )));
        }

        let device = NdArrayDevice::Cpu;
        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(model_binary, &device)
            .map_err(|e| Error::Model(format!("could not restore weights: {:?}", e)))?;
        let model = ModelConfig::new(metadata.class_names.len())
            .init::<CpuBackend>(&device)
            .load_record(record);

        debug!(
            "loaded model with {} classes trained at {}",
            metadata.class_names.len(),
            metadata.trained_at
        );
        Ok(Self::new(model, metadata))
    }

    /// Write weights and metadata to a model bundle.
    pub fn save(&self, path: &Path) -> Result<()> {
        let binary = BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.model.clone().into_record(), ())
            .map_err(|e| Error::Model(format!("could not serialize weights: {:?}", e)))?;
        storage::save_bundle(path, &self.metadata, &binary)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Most likely label and its probability.
    pub fn classify_with_confidence(&self, path: &Path) -> Result<(String, f32)> {
        let size = self.metadata.image_size;
        let data = load_and_normalize_image(path, size).map_err(|e| Error::Classification {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let images = Tensor::<CpuBackend, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([1, 3, size, size]);
        let probabilities = softmax(self.model.forward(images), 1)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Model(format!("could not read prediction: {:?}", e)))?;

        let (index, confidence) = argmax(&probabilities);
        let label = self
            .metadata
            .class_names
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Model(format!("class index {} out of range", index)))?;
        Ok((label, confidence))
    }
}

impl Classifier for InferenceEngine {
    fn classify(&self, path: &Path) -> Result<String> {
        let (label, confidence) = self.classify_with_confidence(path)?;
        debug!("{} -> {} ({:.2})", path.display(), label, confidence);
        Ok(label)
    }
}
