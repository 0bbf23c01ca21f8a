//! Precision/recall/F1 report and the per-sample prediction table.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build from parallel slices of true and predicted class ids.
    /// Undefined ratios (no predictions, no support) count as 0.
    pub fn new(class_names: &[String], actual: &[usize], predicted: &[usize]) -> Self {
        let n = class_names.len();
        let mut true_pos = vec![0usize; n];
        let mut pred_count = vec![0usize; n];
        let mut support = vec![0usize; n];

        for (&a, &p) in actual.iter().zip(predicted) {
            support[a] += 1;
            pred_count[p] += 1;
            if a == p {
                true_pos[a] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = class_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let precision = ratio(true_pos[i], pred_count[i]);
                let recall = ratio(true_pos[i], support[i]);
                ClassMetrics {
                    name: name.clone(),
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: support[i],
                }
            })
            .collect();

        let total: usize = support.iter().sum();
        let correct: usize = true_pos.iter().sum();

        let macro_avg = average("macro avg", &classes, |_| 1.0);
        let weighted_avg = average("weighted avg", &classes, |c| c.support as f64);

        Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
        }
    }

    pub fn total_support(&self) -> usize {
        self.classes.iter().map(|c| c.support).sum()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn average(name: &str, classes: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    let avg = |value: fn(&ClassMetrics) -> f64| {
        if total_weight == 0.0 {
            0.0
        } else {
            classes.iter().map(|c| value(c) * weight(c)).sum::<f64>() / total_weight
        }
    };
    ClassMetrics {
        name: name.to_string(),
        precision: avg(|c| c.precision),
        recall: avg(|c| c.recall),
        f1: avg(|c| c.f1),
        support: classes.iter().map(|c| c.support).sum(),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            write_row(f, c, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.total_support()
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, c: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
        c.name, c.precision, c.recall, c.f1, c.support
    )
}

/// One row of the test-set prediction table.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub path: PathBuf,
    pub actual: String,
    pub predicted: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn is_correct(&self) -> bool {
        self.actual == self.predicted
    }
}

pub fn format_predictions(predictions: &[Prediction]) -> String {
    let name = |p: &Prediction| {
        p.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    };
    let file_w = predictions.iter().map(|p| name(p).len()).max().unwrap_or(0).max(4);
    let label_w = predictions
        .iter()
        .flat_map(|p| [p.actual.len(), p.predicted.len()])
        .max()
        .unwrap_or(0)
        .max("predicted".len());

    let mut out = format!(
        "{:>5}  {:<file_w$}  {:<label_w$}  {:<label_w$}  {:>10}\n",
        "", "file", "actual", "predicted", "confidence"
    );
    for (i, p) in predictions.iter().enumerate() {
        out.push_str(&format!(
            "{:>5}  {:<file_w$}  {:<label_w$}  {:<label_w$}  {:>10.4}{}\n",
            i,
            name(p),
            p.actual,
            p.predicted,
            p.confidence,
            if p.is_correct() { "" } else { "  *" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["cat".to_string(), "dog".to_string()]
    }

    #[test]
    fn test_per_class_metrics() {
        // cat: 3 actual, 2 found, 1 dog mislabeled as cat.
        let actual = [0, 0, 0, 1, 1];
        let predicted = [0, 0, 1, 0, 1];

        let report = ClassificationReport::new(&names(), &actual, &predicted);

        let cat = &report.classes[0];
        assert!((cat.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((cat.recall - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(cat.support, 3);
        let dog = &report.classes[1];
        assert!((dog.precision - 0.5).abs() < 1e-9);
        assert!((dog.recall - 0.5).abs() < 1e-9);
        assert!((report.accuracy - 0.6).abs() < 1e-9);
        assert_eq!(report.total_support(), 5);

        let expected_macro = (2.0 / 3.0 + 0.5) / 2.0;
        assert!((report.macro_avg.precision - expected_macro).abs() < 1e-9);
        let expected_weighted = (2.0 / 3.0 * 3.0 + 0.5 * 2.0) / 5.0;
        assert!((report.weighted_avg.recall - expected_weighted).abs() < 1e-9);
    }

    #[test]
    fn test_class_never_predicted_scores_zero() {
        let report = ClassificationReport::new(&names(), &[0, 1], &[0, 0]);
        let dog = &report.classes[1];
        assert_eq!(dog.precision, 0.0);
        assert_eq!(dog.recall, 0.0);
        assert_eq!(dog.f1, 0.0);
    }

    #[test]
    fn test_report_lists_every_class() {
        let report = ClassificationReport::new(&names(), &[0, 1], &[0, 1]);
        let text = report.to_string();

        assert!(text.contains("precision"));
        assert!(text.contains("recall"));
        for name in names() {
            assert!(text.contains(&name));
        }
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_prediction_table_marks_mistakes() {
        let predictions = vec![
            Prediction {
                path: PathBuf::from("/t/cat/a.jpg"),
                actual: "cat".into(),
                predicted: "cat".into(),
                confidence: 0.9,
            },
            Prediction {
                path: PathBuf::from("/t/dog/b.jpg"),
                actual: "dog".into(),
                predicted: "cat".into(),
                confidence: 0.6,
            },
        ];

        let table = format_predictions(&predictions);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("confidence"));
        assert!(!lines[1].ends_with('*'));
        assert!(lines[2].ends_with('*'));
    }
}
