use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2, Array3, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EcgError, Result};
use crate::train::{Classifier, TrainConfig, TrainReport, TrainingSession};
use crate::window::argmax_rows;

/// Statistics computed per channel: mean, standard deviation, min, max.
const STATS_PER_CHANNEL: usize = 4;

/// Fitted parameters of [`WindowStatsClassifier`], as stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub num_channels: usize,
    /// 训练集特征均值
    pub feature_mean: Vec<f64>,
    /// 训练集特征标准差（零方差时为 1）
    pub feature_scale: Vec<f64>,
    /// classes × features
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl SoftmaxModel {
    pub fn num_classes(&self) -> usize {
        self.bias.len()
    }

    /// Writes the model as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| EcgError::Checkpoint(format!("{}: {}", path.display(), e)))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| EcgError::Checkpoint(format!("{}: {}", path.display(), e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EcgError::Checkpoint(format!("{}: {}", path.display(), e)))
    }

    fn weight_matrix(&self) -> Result<Array2<f64>> {
        let rows = self.weights.len();
        let cols = self.feature_mean.len();
        let flat: Vec<f64> = self.weights.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| EcgError::Checkpoint(format!("weight matrix: {}", e)))
    }

    fn standardize(&self, stats: &mut Array2<f64>) {
        let mean = Array1::from(self.feature_mean.clone());
        let scale = Array1::from(self.feature_scale.clone());
        *stats -= &mean;
        *stats /= &scale;
    }

    /// Class probabilities, windows × classes.
    fn probabilities(&self, features: &Array3<f32>) -> Result<Array2<f64>> {
        let channels = features.len_of(Axis(1));
        if channels != self.num_channels {
            return Err(EcgError::LengthMismatch {
                what: "feature channels".to_string(),
                expected: self.num_channels,
                actual: channels,
            });
        }

        let mut x = window_statistics(features);
        self.standardize(&mut x);
        let w = self.weight_matrix()?;
        let b = Array1::from(self.bias.clone());

        let mut logits = x.dot(&w.t()) + &b;
        softmax_rows(&mut logits);
        Ok(logits)
    }
}

/// Baseline classifier: weighted softmax regression over per-channel
/// window statistics.
///
/// Each window is summarized by the mean, standard deviation, minimum and
/// maximum of every channel. The summaries are standardized with the
/// training set's statistics and fed to a linear softmax layer trained by
/// minibatch gradient descent on the weighted cross-entropy.
///
/// # Examples
///
/// ```rust
/// use ecgwin::{Classifier, TrainConfig, WindowStatsClassifier};
/// use ndarray::{Array1, Array2, Array3};
///
/// # let dir = std::env::temp_dir().join("ecgwin_doc_baseline");
/// // 8 windows of 1 channel × 16 samples; class 1 sits at a higher level
/// let features = Array3::from_shape_fn((8, 1, 16), |(w, _, t)| {
///     (w % 2) as f32 * 2.0 + (t as f32 * 0.7).sin() * 0.1
/// });
/// let labels = Array2::from_shape_fn((8, 2), |(w, c)| if w % 2 == c { 1.0 } else { 0.0 });
/// let weights = Array1::from_elem(8, 0.5);
///
/// let config = TrainConfig {
///     epochs: 20,
///     batch_size: 4,
///     learning_rate: 0.5,
///     checkpoint_dir: dir.join("models"),
///     log_dir: dir.join("logs"),
///     ..TrainConfig::default()
/// };
///
/// let mut classifier = WindowStatsClassifier::new();
/// let report = classifier.fit(&features, &labels, &weights, &config)?;
/// assert_eq!(report.epoch_losses.len(), 20);
/// assert_eq!(classifier.predict_classes(&features)?, vec![0, 1, 0, 1, 0, 1, 0, 1]);
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct WindowStatsClassifier {
    model: Option<SoftmaxModel>,
}

impl WindowStatsClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_model(model: SoftmaxModel) -> Self {
        WindowStatsClassifier { model: Some(model) }
    }

    /// Restores a classifier from a checkpoint written during `fit`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_model(SoftmaxModel::load(path)?))
    }

    pub fn model(&self) -> Option<&SoftmaxModel> {
        self.model.as_ref()
    }

    fn fitted(&self) -> Result<&SoftmaxModel> {
        self.model
            .as_ref()
            .ok_or_else(|| EcgError::InvalidConfig("classifier has not been fitted".to_string()))
    }
}

impl Classifier for WindowStatsClassifier {
    fn fit(
        &mut self,
        features: &Array3<f32>,
        labels: &Array2<f32>,
        weights: &Array1<f32>,
        config: &TrainConfig,
    ) -> Result<TrainReport> {
        let n = features.len_of(Axis(0));
        if n == 0 {
            return Err(EcgError::EmptyDataset("no training windows".to_string()));
        }
        for (what, len) in [("labels", labels.nrows()), ("weights", weights.len())] {
            if len != n {
                return Err(EcgError::LengthMismatch {
                    what: what.to_string(),
                    expected: n,
                    actual: len,
                });
            }
        }

        let num_classes = labels.ncols();
        let mut x = window_statistics(features);
        let feature_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let feature_scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        x -= &feature_mean;
        x /= &feature_scale;

        let y = labels.mapv(f64::from);
        let classes = argmax_rows(labels);
        let sample_weights = weights.mapv(f64::from);

        let mut w = Array2::<f64>::zeros((num_classes, x.ncols()));
        let mut b = Array1::<f64>::zeros(num_classes);

        log::info!(
            "fitting softmax baseline: {} windows, {} features, {} classes",
            n,
            x.ncols(),
            num_classes
        );

        let mut session = TrainingSession::start(config)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut order: Vec<usize> = (0..n).collect();

        for epoch in 1..=config.epochs {
            session.begin_epoch();
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in order.chunks(config.batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                let wb = sample_weights.select(Axis(0), batch);

                let mut probs = xb.dot(&w.t()) + &b;
                softmax_rows(&mut probs);

                for (row, &i) in probs.rows().into_iter().zip(batch) {
                    let p = row[classes[i]].max(1e-12);
                    epoch_loss -= sample_weights[i] * p.ln();
                }

                // 加权交叉熵对 logits 的梯度
                let mut delta = probs - &yb;
                delta *= &wb.insert_axis(Axis(1));

                let step = config.learning_rate / batch.len() as f64;
                w.scaled_add(-step, &delta.t().dot(&xb));
                b.scaled_add(-step, &delta.sum_axis(Axis(0)));
            }
            let loss = epoch_loss / n as f64;

            let model = SoftmaxModel {
                num_channels: features.len_of(Axis(1)),
                feature_mean: feature_mean.to_vec(),
                feature_scale: feature_scale.to_vec(),
                weights: w.rows().into_iter().map(|r| r.to_vec()).collect(),
                bias: b.to_vec(),
            };
            session.end_epoch(epoch, loss, |path| model.save(path))?;
            self.model = Some(model);
        }

        session.finish()
    }

    fn predict_classes(&self, features: &Array3<f32>) -> Result<Vec<usize>> {
        let model = self.fitted()?;
        if features.len_of(Axis(0)) == 0 {
            return Ok(Vec::new());
        }
        let probs = model.probabilities(features)?;
        Ok(argmax_rows(&probs.mapv(|p| p as f32)))
    }
}

/// Per-channel mean, std, min and max of every window, windows × (4 · channels).
pub fn window_statistics(features: &Array3<f32>) -> Array2<f64> {
    let (n, channels, _) = features.dim();
    let mut stats = Array2::<f64>::zeros((n, channels * STATS_PER_CHANNEL));

    for (i, window) in features.outer_iter().enumerate() {
        for (c, row) in window.outer_iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            let len = row.len() as f64;
            let mean = row.iter().map(|&v| f64::from(v)).sum::<f64>() / len;
            let var = row
                .iter()
                .map(|&v| (f64::from(v) - mean).powi(2))
                .sum::<f64>()
                / len;
            let (min, max) = row.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(f64::from(v)), hi.max(f64::from(v)))
            });

            let base = c * STATS_PER_CHANNEL;
            stats[[i, base]] = mean;
            stats[[i, base + 1]] = var.sqrt();
            stats[[i, base + 2]] = min;
            stats[[i, base + 3]] = max;
        }
    }
    stats
}

fn softmax_rows(logits: &mut Array2<f64>) {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
}
