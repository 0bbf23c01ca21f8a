//! Train, evaluate and report.

use crate::error::{Error, Result};
use crate::ml::{
    ClassificationReport, CpuBackend, ImageBatch, ImageBatcher, ImageFolder, ModelConfig, PhotoClassifier,
    Prediction, TrainBackend, TrainingHistory, MIN_IMAGE_SIZE,
};
use burn::{
    backend::ndarray::NdArrayDevice,
    data::{dataloader::batcher::Batcher, dataloader::DataLoaderBuilder, dataset::Dataset},
    module::Module,
    optim::AdamConfig,
    tensor::{
        activation::softmax,
        backend::{AutodiffBackend, Backend},
    },
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, LearningStrategy, TrainOutput, TrainStep, ValidStep,
    },
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LEARNING_RATE: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub image_size: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub seed: u64,
    pub epochs: usize,
}

impl TrainOptions {
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 || self.batch_size == 0 {
            return Err(Error::Config(format!(
                "image size and batch size must be positive (got {} and {})",
                self.image_size, self.batch_size
            )));
        }
        if self.image_size < MIN_IMAGE_SIZE {
            return Err(Error::Config(format!(
                "image size must be at least {} pixels (got {})",
                MIN_IMAGE_SIZE, self.image_size
            )));
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(Error::Config(format!(
                "validation split must be between 0 and 1 (got {})",
                self.validation_split
            )));
        }
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Everything a training run produces.
pub struct TrainingOutcome {
    pub class_names: Vec<String>,
    pub model_summary: String,
    pub history: TrainingHistory,
    pub report: ClassificationReport,
    pub predictions: Vec<Prediction>,
    pub model: PhotoClassifier<CpuBackend>,
}

impl<B: AutodiffBackend> TrainStep<ImageBatch<B>, ClassificationOutput<B>> for PhotoClassifier<B> {
    fn step(&self, batch: ImageBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);
        let grads = item.loss.backward();
        TrainOutput::new(self, grads, item)
    }
}

impl<B: Backend> ValidStep<ImageBatch<B>, ClassificationOutput<B>> for PhotoClassifier<B> {
    fn step(&self, batch: ImageBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// Fit a classifier on `dataset_dir` and evaluate it on `test_dir`.
///
/// Both directories hold one subfolder of images per class.
pub fn train_test_model(
    dataset_dir: &Path,
    test_dir: &Path,
    options: &TrainOptions,
) -> Result<TrainingOutcome> {
    options.validate()?;

    let dataset = ImageFolder::from_directory(dataset_dir)?;
    let class_names = dataset.class_names().to_vec();
    // Check the test layout before spending time on training.
    let test_set = ImageFolder::with_classes(test_dir, &class_names)?;

    if dataset.len() < 2 {
        return Err(Error::DataLoad(format!(
            "need at least 2 images to split into training and validation, found {}",
            dataset.len()
        )));
    }
    for (name, count) in class_names.iter().zip(dataset.count_per_class()) {
        info!("class '{}': {} images", name, count);
    }

    let (train_set, valid_set) = dataset.split(options.validation_split, options.seed);
    info!(
        "{} training images, {} validation images, {} test images",
        train_set.len(),
        valid_set.len(),
        test_set.len()
    );

    let model_config = ModelConfig::new(class_names.len());
    let device = NdArrayDevice::Cpu;

    let dataloader_train = DataLoaderBuilder::new(ImageBatcher::<TrainBackend>::new(
        device.clone(),
        options.image_size,
    ))
    .batch_size(options.batch_size)
    .shuffle(options.seed)
    .build(train_set);

    let dataloader_valid = DataLoaderBuilder::new(ImageBatcher::<CpuBackend>::new(
        device.clone(),
        options.image_size,
    ))
    .batch_size(options.batch_size)
    .build(valid_set);

    let artifact_dir = ArtifactDir::create()?;

    let learner = LearnerBuilder::new(&artifact_dir.path_str())
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(options.epochs)
        .summary()
        .build(
            model_config.init::<TrainBackend>(&device),
            AdamConfig::new().init(),
            LEARNING_RATE,
        );

    info!(
        "training for {} epochs, batch size {}",
        options.epochs, options.batch_size
    );
    let trained = learner.fit(dataloader_train, dataloader_valid);
    let model = trained.model;

    let history = TrainingHistory::from_artifact_dir(artifact_dir.path(), options.epochs);
    let model_summary = format!(
        "{}\nTrainable parameters: {}",
        model_config.summary(options.image_size),
        model.num_params()
    );

    let predictions = predict(&model, &test_set, options)?;
    let actual: Vec<usize> = test_set.items().iter().map(|i| i.label).collect();
    let predicted: Vec<usize> = predictions.iter().map(|(label, _)| *label).collect();
    let report = ClassificationReport::new(&class_names, &actual, &predicted);

    let predictions = test_set
        .items()
        .iter()
        .zip(predictions)
        .map(|(item, (label, confidence))| Prediction {
            path: item.path.clone(),
            actual: class_names[item.label].clone(),
            predicted: class_names[label].clone(),
            confidence,
        })
        .collect();

    Ok(TrainingOutcome {
        class_names,
        model_summary,
        history,
        report,
        predictions,
        model,
    })
}

/// Predicted class id and its softmax probability for every test item.
fn predict(
    model: &PhotoClassifier<CpuBackend>,
    test_set: &ImageFolder,
    options: &TrainOptions,
) -> Result<Vec<(usize, f32)>> {
    let device = NdArrayDevice::Cpu;
    let batcher = ImageBatcher::<CpuBackend>::new(device.clone(), options.image_size);
    let mut results = Vec::with_capacity(test_set.len());

    for chunk in test_set.items().chunks(options.batch_size) {
        let batch = batcher.batch(chunk.to_vec(), &device);
        let probabilities = softmax(model.forward(batch.images), 1);
        let [_, num_classes] = probabilities.dims();
        let values = probabilities
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Evaluation(format!("could not read predictions: {:?}", e)))?;

        results.extend(values.chunks(num_classes).map(argmax));
    }

    Ok(results)
}

pub(crate) fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

/// Scratch directory for the learner's checkpoints and metric logs,
/// removed when dropped.
struct ArtifactDir(PathBuf);

impl ArtifactDir {
    fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("tidymypics-training-{}", std::process::id()));
        std::fs::create_dir_all(&path).map_err(|e| Error::io_fatal(&path, e))?;
        debug!("training artifacts in {}", path.display());
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn path_str(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl Drop for ArtifactDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TrainOptions {
        TrainOptions {
            image_size: 16,
            batch_size: 4,
            validation_split: 0.2,
            seed: 3224,
            epochs: 1,
        }
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        let mut opts = options();
        opts.image_size = 0;
        assert!(matches!(opts.validate(), Err(Error::Config(_))));

        let mut opts = options();
        opts.batch_size = 0;
        assert!(matches!(opts.validate(), Err(Error::Config(_))));

        let mut opts = options();
        opts.validation_split = 1.0;
        assert!(matches!(opts.validate(), Err(Error::Config(_))));

        assert!(options().validate().is_ok());
    }

    #[test]
    fn test_config_error_comes_before_data_loading() {
        let tmp = tempfile::tempdir().unwrap();
        let mut opts = options();
        opts.batch_size = 0;

        let result = train_test_model(tmp.path(), tmp.path(), &opts);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_dataset_fails_to_load() {
        let dataset = tempfile::tempdir().unwrap();
        let test = tempfile::tempdir().unwrap();

        let result = train_test_model(dataset.path(), test.path(), &options());
        assert!(matches!(result, Err(Error::DataLoad(_))));
    }

    #[test]
    fn test_mismatched_test_folder_fails_before_training() {
        let dataset = tempfile::tempdir().unwrap();
        let test = tempfile::tempdir().unwrap();
        for class in ["cat", "dog"] {
            let dir = dataset.path().join(class);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("a.jpg"), b"").unwrap();
        }
        std::fs::create_dir(test.path().join("horse")).unwrap();

        let result = train_test_model(dataset.path(), test.path(), &options());
        assert!(matches!(result, Err(Error::Evaluation(_))));
    }

    fn write_class(root: &Path, class: &str, rgb: [u8; 3], count: usize) {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            image::RgbImage::from_pixel(20, 20, image::Rgb(rgb))
                .save(dir.join(format!("{}_{}.png", class, i)))
                .unwrap();
        }
    }

    #[test]
    fn test_two_class_training_reports_both_classes() {
        let dataset = tempfile::tempdir().unwrap();
        let test = tempfile::tempdir().unwrap();
        write_class(dataset.path(), "blue", [0, 0, 255], 6);
        write_class(dataset.path(), "red", [255, 0, 0], 6);
        write_class(test.path(), "blue", [0, 0, 255], 2);
        write_class(test.path(), "red", [255, 0, 0], 2);

        let outcome = train_test_model(dataset.path(), test.path(), &options()).unwrap();

        assert_eq!(outcome.class_names, vec!["blue", "red"]);
        assert_eq!(outcome.report.classes.len(), 2);
        assert_eq!(outcome.report.total_support(), 4);
        assert_eq!(outcome.predictions.len(), 4);
        assert_eq!(outcome.history.epochs.len(), 1);
        let text = outcome.report.to_string();
        assert!(text.contains("precision") && text.contains("recall"));
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), (1, 0.7));
        assert_eq!(argmax(&[0.5]), (0, 0.5));
    }
}
