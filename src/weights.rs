use ndarray::{Array1, Array2, Axis};

use crate::window::argmax_rows;

/// Per-class deficit `1 - count(c) / N` of a one-hot label array.
///
/// Rare classes get values near 1, the majority class values near 0.
pub fn class_fractions(labels: &Array2<f32>) -> Array1<f32> {
    let n = labels.nrows();
    if n == 0 {
        return Array1::zeros(labels.ncols());
    }

    labels
        .sum_axis(Axis(0))
        .mapv(|count| 1.0 - count / n as f32)
}

/// Per-window training weight: the class fraction of the window's class.
///
/// ```rust
/// use ecgwin::weights::sample_weights;
/// use ndarray::array;
///
/// // classes [0, 0, 0, 1]
/// let labels = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
/// let weights = sample_weights(&labels);
/// assert_eq!(weights.to_vec(), vec![0.25, 0.25, 0.25, 0.75]);
/// ```
pub fn sample_weights(labels: &Array2<f32>) -> Array1<f32> {
    let fractions = class_fractions(labels);
    argmax_rows(labels)
        .into_iter()
        .map(|class| fractions[class])
        .collect()
}
