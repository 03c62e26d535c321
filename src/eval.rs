use std::fmt;

use serde::Serialize;

use crate::error::{EcgError, Result};
use crate::label::LabelMap;

/// Mean-prediction threshold separating class 0 from class 1.
pub const RECORD_THRESHOLD: f64 = 0.5;

/// Window-level confusion matrix; rows are true classes, columns predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// # Errors
    ///
    /// * `EcgError::LengthMismatch` - `truth` and `predicted` differ in length
    /// * `EcgError::UnknownLabel` - A class index is `>= num_classes`
    pub fn from_predictions(
        truth: &[usize],
        predicted: &[usize],
        num_classes: usize,
    ) -> Result<Self> {
        check_lengths("predictions", truth.len(), predicted.len())?;

        let mut counts = vec![vec![0; num_classes]; num_classes];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t >= num_classes || p >= num_classes {
                return Err(EcgError::UnknownLabel(format!(
                    "class {} out of {}",
                    t.max(p),
                    num_classes
                )));
            }
            counts[t][p] += 1;
        }

        Ok(ConfusionMatrix { counts })
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Windows of true class `truth` predicted as `predicted`, or `None`
    /// when either index is out of range.
    pub fn get(&self, truth: usize, predicted: usize) -> Option<usize> {
        self.counts.get(truth)?.get(predicted).copied()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|c| self.counts[c][c]).sum()
    }

    /// Fraction of windows on the diagonal; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1);

        for (i, row) in self.counts.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>width$}", c)).collect();
            let open = if i == 0 { "[[" } else { " [" };
            let close = if i + 1 == self.counts.len() { "]]" } else { "]" };
            writeln!(f, "{}{}{}", open, cells.join(" "), close)?;
        }
        Ok(())
    }
}

/// Raw window accuracy; 0 when there are no windows.
pub fn window_accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// Window predictions of one record, averaged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordScore {
    pub record: String,
    pub mean_prediction: f64,
    pub true_class: usize,
    pub window_count: usize,
}

impl RecordScore {
    pub fn predicted_class(&self) -> usize {
        classify_record(self.mean_prediction)
    }

    pub fn is_correct(&self) -> bool {
        self.predicted_class() == self.true_class
    }
}

/// Class 0 when the mean prediction is at most 0.5, class 1 above.
pub fn classify_record(mean_prediction: f64) -> usize {
    if mean_prediction <= RECORD_THRESHOLD {
        0
    } else {
        1
    }
}

/// Groups windows by source record and averages their predicted class.
///
/// Records appear in order of their first window.
///
/// ```rust
/// use ecgwin::eval::aggregate_by_record;
///
/// let records = vec!["A".to_string(), "A".to_string(), "B".to_string()];
/// let scores = aggregate_by_record(&records, &[0, 1, 1], &[0, 0, 1])?;
///
/// assert_eq!(scores[0].mean_prediction, 0.5);
/// assert_eq!(scores[0].predicted_class(), 0);
/// assert_eq!(scores[1].mean_prediction, 1.0);
/// assert_eq!(scores[1].predicted_class(), 1);
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub fn aggregate_by_record(
    record_ids: &[String],
    predicted: &[usize],
    truth: &[usize],
) -> Result<Vec<RecordScore>> {
    check_lengths("predictions", record_ids.len(), predicted.len())?;
    check_lengths("labels", record_ids.len(), truth.len())?;

    // (record, sum of predictions, sum of labels, count)
    let mut groups: Vec<(&str, usize, usize, usize)> = Vec::new();
    for ((record, &p), &t) in record_ids.iter().zip(predicted).zip(truth) {
        match groups.iter_mut().rev().find(|g| g.0 == record.as_str()) {
            Some(group) => {
                group.1 += p;
                group.2 += t;
                group.3 += 1;
            }
            None => groups.push((record.as_str(), p, t, 1)),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(record, pred_sum, true_sum, count)| RecordScore {
            record: record.to_string(),
            mean_prediction: pred_sum as f64 / count as f64,
            true_class: (true_sum as f64 / count as f64).round() as usize,
            window_count: count,
        })
        .collect())
}

/// Record accuracy per true class; `None` for a class with no records.
pub fn record_accuracy_by_class(scores: &[RecordScore], num_classes: usize) -> Vec<Option<f64>> {
    (0..num_classes)
        .map(|class| {
            let of_class: Vec<&RecordScore> =
                scores.iter().filter(|s| s.true_class == class).collect();
            if of_class.is_empty() {
                None
            } else {
                let correct = of_class.iter().filter(|s| s.is_correct()).count();
                Some(correct as f64 / of_class.len() as f64)
            }
        })
        .collect()
}

/// Window- and record-level evaluation of one test set.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub labels: Vec<String>,
    pub window_accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub records: Vec<RecordScore>,
    pub record_accuracy: Vec<Option<f64>>,
}

/// Evaluates window predictions and their per-record aggregation.
///
/// # Errors
///
/// * `EcgError::UnsupportedClassCount` - `label_map` does not hold exactly two labels
pub fn evaluate(
    label_map: &LabelMap,
    truth: &[usize],
    predicted: &[usize],
    record_ids: &[String],
) -> Result<EvaluationReport> {
    if label_map.len() != 2 {
        return Err(EcgError::UnsupportedClassCount(label_map.len()));
    }

    let confusion = ConfusionMatrix::from_predictions(truth, predicted, 2)?;
    let records = aggregate_by_record(record_ids, predicted, truth)?;
    let record_accuracy = record_accuracy_by_class(&records, 2);

    Ok(EvaluationReport {
        labels: label_map.labels().to_vec(),
        window_accuracy: window_accuracy(truth, predicted),
        confusion,
        records,
        record_accuracy,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Window accuracy: {:.4}", self.window_accuracy)?;
        writeln!(f, "Confusion matrix:")?;
        write!(f, "{}", self.confusion)?;
        writeln!(f, "Records: {}", self.records.len())?;

        for (class, accuracy) in self.record_accuracy.iter().enumerate() {
            let name = match class {
                0 => "Control",
                1 => "Infarct",
                _ => "Class",
            };
            let label = self.labels.get(class).map(String::as_str).unwrap_or("");
            match accuracy {
                Some(acc) => writeln!(f, "{} accuracy ({}): {:.4}", name, label, acc)?,
                None => writeln!(f, "{} accuracy ({}): n/a", name, label)?,
            }
        }
        Ok(())
    }
}

fn check_lengths(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EcgError::LengthMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
