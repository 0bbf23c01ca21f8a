//! Photo classifier network and image preprocessing.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use image::imageops::FilterType;
use std::path::Path;

/// Smallest side length that survives the three pooling stages.
pub const MIN_IMAGE_SIZE: usize = 8;

const CHANNELS: [usize; 4] = [3, 16, 32, 64];
const HIDDEN: usize = 128;

#[derive(Config, Debug)]
pub struct ModelConfig {
    pub num_classes: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl ModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PhotoClassifier<B> {
        let conv = |i: usize| {
            Conv2dConfig::new([CHANNELS[i], CHANNELS[i + 1]], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };

        PhotoClassifier {
            conv1: conv(0),
            conv2: conv(1),
            conv3: conv(2),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(CHANNELS[3], HIDDEN).init(device),
            fc2: LinearConfig::new(HIDDEN, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Layer-by-layer description for a given input size.
    pub fn summary(&self, image_size: usize) -> String {
        let mut lines = vec![format!("Input            3 x {0} x {0}", image_size)];
        let mut size = image_size;
        for (i, pair) in CHANNELS.windows(2).enumerate() {
            lines.push(format!(
                "Conv{} 3x3 same   {} -> {} x {} x {} + ReLU",
                i + 1,
                pair[0],
                pair[1],
                size,
                size
            ));
            size /= 2;
            lines.push(format!("MaxPool 2x2      {} x {} x {}", pair[1], size, size));
        }
        lines.push(format!("GlobalAvgPool    {}", CHANNELS[3]));
        lines.push(format!("Dropout          p={}", self.dropout));
        lines.push(format!("Dense            {} -> {} + ReLU", CHANNELS[3], HIDDEN));
        lines.push(format!("Dense            {} -> {}", HIDDEN, self.num_classes));
        lines.join("\n")
    }
}

/// Small convolutional classifier.
///
/// Three `{Conv 3x3 + ReLU + MaxPool 2x2}` stages, global average pooling,
/// then two dense layers producing one logit per class.
#[derive(Module, Debug)]
pub struct PhotoClassifier<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    global_pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> PhotoClassifier<B> {
    /// `images`: `[batch_size, 3, size, size]` -> logits `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));

        let x = self.global_pool.forward(x);
        let x = x.reshape([batch_size, CHANNELS[3]]);
        let x = self.dropout.forward(x);

        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

/// Decode an image, resize it to `size` x `size` and normalize it with the
/// ImageNet mean and standard deviation. Output is flattened `(C, H, W)`.
pub fn load_and_normalize_image(path: &Path, size: usize) -> anyhow::Result<Vec<f32>> {
    let img = image::open(path)?
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_rgb8();

    let mean = [0.485, 0.456, 0.406];
    let std = [0.229, 0.224, 0.225];

    let mut data = Vec::with_capacity(3 * size * size);
    for channel in 0..3 {
        for pixel in img.pixels() {
            let value = pixel[channel] as f32 / 255.0;
            data.push((value - mean[channel]) / std[channel]);
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::CpuBackend;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = ModelConfig::new(3).init::<CpuBackend>(&device);
        let images = Tensor::<CpuBackend, 4>::zeros([2, 3, 16, 16], &device);

        assert_eq!(model.forward(images).dims(), [2, 3]);
    }

    #[test]
    fn test_summary_tracks_spatial_size() {
        let summary = ModelConfig::new(2).summary(64);
        assert!(summary.contains("Input            3 x 64 x 64"));
        assert!(summary.contains("MaxPool 2x2      64 x 8 x 8"));
        assert!(summary.ends_with("128 -> 2"));
    }

    #[test]
    fn test_load_and_normalize_image_resizes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("white.png");
        image::RgbImage::from_pixel(20, 10, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let data = load_and_normalize_image(&path, 8).unwrap();

        assert_eq!(data.len(), 3 * 8 * 8);
        let expected_red = (1.0 - 0.485) / 0.229;
        assert!((data[0] - expected_red).abs() < 1e-4);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(load_and_normalize_image(&path, 8).is_err());
    }
}
