pub mod dataset;
pub mod history;
pub mod inference;
pub mod model;
pub mod report;
pub mod storage;
pub mod training;

pub use dataset::{ImageBatch, ImageBatcher, ImageFolder};
pub use history::TrainingHistory;
pub use inference::InferenceEngine;
pub use model::{load_and_normalize_image, ModelConfig, PhotoClassifier, MIN_IMAGE_SIZE};
pub use report::{format_predictions, ClassificationReport, Prediction};
pub use storage::ModelMetadata;
pub use training::{train_test_model, TrainOptions};

/// Inference runs on the CPU.
pub type CpuBackend = burn::backend::NdArray<f32>;
pub type TrainBackend = burn::backend::Autodiff<CpuBackend>;

/// Tool and framework backend, printed before the run configuration.
pub fn versions() -> String {
    format!(
        "tidymypics {} (burn, ndarray backend, cpu)",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_versions_names_the_backend() {
        let banner = super::versions();
        assert!(banner.starts_with(concat!("tidymypics ", env!("CARGO_PKG_VERSION"))));
        assert!(banner.contains("burn, ndarray"));
    }
}
