//! Per-epoch loss and accuracy, read back from the learner's metric logs.
//!
//! The learner writes one value per iteration to
//! `<artifact_dir>/<split>/epoch-<n>/<Metric>.log`; an epoch's value is the
//! mean of its lines weighted by batch size.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: Option<f64>,
    pub train_accuracy: Option<f64>,
    pub valid_loss: Option<f64>,
    pub valid_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn from_artifact_dir(dir: &Path, num_epochs: usize) -> Self {
        let epochs = (1..=num_epochs)
            .map(|epoch| EpochMetrics {
                epoch,
                train_loss: epoch_mean(dir, "train", epoch, "Loss"),
                train_accuracy: epoch_mean(dir, "train", epoch, "Accuracy"),
                valid_loss: epoch_mean(dir, "valid", epoch, "Loss"),
                valid_accuracy: epoch_mean(dir, "valid", epoch, "Accuracy"),
            })
            .collect();
        Self { epochs }
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

fn epoch_mean(dir: &Path, split: &str, epoch: usize, metric: &str) -> Option<f64> {
    let path = dir
        .join(split)
        .join(format!("epoch-{}", epoch))
        .join(format!("{}.log", metric));
    let content = std::fs::read_to_string(path).ok()?;
    mean_of_lines(&content)
}

/// Lines are `value,count` with count the number of samples behind the
/// value; the epoch value is the count-weighted mean. A bare value counts as 1.
fn mean_of_lines(content: &str) -> Option<f64> {
    let (sum, total) = content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(',');
            let value: f64 = fields.next()?.trim().parse().ok()?;
            let count: f64 = match fields.next() {
                Some(n) => n.trim().parse().ok()?,
                None => 1.0,
            };
            Some((value, count))
        })
        .fold((0.0, 0.0), |(sum, total), (v, n)| (sum + v * n, total + n));
    if total == 0.0 {
        return None;
    }
    Some(sum / total)
}

impl fmt::Display for TrainingHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));

        writeln!(
            f,
            "{:>5}  {:>10}  {:>10}  {:>10}  {:>10}",
            "epoch", "loss", "accuracy", "val_loss", "val_acc"
        )?;
        for e in &self.epochs {
            writeln!(
                f,
                "{:>5}  {:>10}  {:>10}  {:>10}  {:>10}",
                e.epoch,
                cell(e.train_loss),
                cell(e.train_accuracy),
                cell(e.valid_loss),
                cell(e.valid_accuracy)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_mean_of_lines_accepts_both_formats() {
        assert_eq!(mean_of_lines("1.0\n3.0\n"), Some(2.0));
        assert_eq!(mean_of_lines("50.0,32\n100.0,32\n"), Some(75.0));
        assert_eq!(mean_of_lines(""), None);
        assert_eq!(mean_of_lines("garbage\n"), None);
    }

    #[test]
    fn test_short_last_batch_is_weighted_by_count() {
        let mean = mean_of_lines("100,4\n50,4\n100,2\n").unwrap();
        assert!((mean - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_reads_epoch_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let epoch1 = tmp.path().join("train/epoch-1");
        fs::create_dir_all(&epoch1).unwrap();
        fs::write(epoch1.join("Loss.log"), "0.9\n0.7\n").unwrap();
        let valid1 = tmp.path().join("valid/epoch-1");
        fs::create_dir_all(&valid1).unwrap();
        fs::write(valid1.join("Accuracy.log"), "60\n").unwrap();

        let history = TrainingHistory::from_artifact_dir(tmp.path(), 2);

        assert_eq!(history.epochs.len(), 2);
        let first = &history.epochs[0];
        assert!((first.train_loss.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(first.valid_accuracy, Some(60.0));
        assert_eq!(first.train_accuracy, None);
        assert_eq!(history.last().unwrap().epoch, 2);
        assert!(history.to_string().contains("val_loss"));
    }
}
