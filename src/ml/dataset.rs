//! Labeled image folders: one subdirectory per class.

use crate::error::{Error, Result};
use crate::scanner;
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

#[derive(Clone, Debug)]
pub struct ImageItem {
    pub path: PathBuf,
    pub label: usize,
}

/// Image paths with their class ids. Pixels are decoded lazily by the batcher.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    items: Vec<ImageItem>,
    class_names: Vec<String>,
}

impl ImageFolder {
    /// Load a training dataset. Classes are the subdirectory names in
    /// alphabetical order; images are collected recursively inside each.
    pub fn from_directory(data_dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(data_dir)
            .map_err(|e| Error::DataLoad(format!("{}: {}", data_dir.display(), e)))?;

        let mut class_names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        class_names.sort();

        if class_names.is_empty() {
            return Err(Error::DataLoad(format!(
                "no class subdirectories found in {}",
                data_dir.display()
            )));
        }

        let dataset = Self::collect(data_dir, class_names);
        if dataset.items.is_empty() {
            return Err(Error::DataLoad(format!(
                "no images found in {}",
                data_dir.display()
            )));
        }
        Ok(dataset)
    }

    /// Load a test dataset that must use the training classes. Classes
    /// missing from the test directory are allowed; unknown ones are not.
    pub fn with_classes(test_dir: &Path, class_names: &[String]) -> Result<Self> {
        let entries = std::fs::read_dir(test_dir)
            .map_err(|e| Error::Evaluation(format!("{}: {}", test_dir.display(), e)))?;

        let mut unknown: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.') && !class_names.contains(name))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(Error::Evaluation(format!(
                "{} has classes the model was not trained on: {}",
                test_dir.display(),
                unknown.join(", ")
            )));
        }

        let dataset = Self::collect(test_dir, class_names.to_vec());
        if dataset.items.is_empty() {
            return Err(Error::Evaluation(format!(
                "no labeled test images found in {} (expected subfolders named {})",
                test_dir.display(),
                class_names.join(", ")
            )));
        }
        Ok(dataset)
    }

    fn collect(root: &Path, class_names: Vec<String>) -> Self {
        let mut items = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root.join(class_name);
            if !class_dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&class_dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && scanner::is_image(path) {
                    items.push(ImageItem {
                        path: path.to_path_buf(),
                        label,
                    });
                }
            }
        }
        Self { items, class_names }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn count_per_class(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_names.len()];
        for item in &self.items {
            counts[item.label] += 1;
        }
        counts
    }

    /// Shuffle with `seed` and hold out `validation_split` of the items.
    /// The same seed always yields the same split.
    pub fn split(self, validation_split: f64, seed: u64) -> (Self, Self) {
        let mut items = self.items;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);

        let total = items.len();
        let mut valid_len = (total as f64 * validation_split) as usize;
        // Both halves need at least one item once there are two to share.
        if total >= 2 {
            valid_len = valid_len.clamp(1, total - 1);
        }

        let valid_items = items.split_off(total - valid_len);
        (
            Self {
                items,
                class_names: self.class_names.clone(),
            },
            Self {
                items: valid_items,
                class_names: self.class_names,
            },
        )
    }
}

impl Dataset<ImageItem> for ImageFolder {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, _device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;
        let mut pixels = Vec::with_capacity(batch_size * 3 * size * size);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            match super::load_and_normalize_image(&item.path, size) {
                Ok(data) => pixels.extend_from_slice(&data),
                Err(e) => {
                    // Keep batch shape; a blank image is the least harmful stand-in.
                    warn!("could not read {}: {}", item.path.display(), e);
                    pixels.extend(std::iter::repeat(0.0f32).take(3 * size * size));
                }
            }
            targets.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, 3, size, size]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}
