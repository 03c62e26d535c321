use ndarray::{s, Array2, Array3, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::catalog::CatalogEntry;
use crate::error::{EcgError, Result};
use crate::label::LabelMap;

/// Default window length in samples.
pub const DEFAULT_WINDOW_SIZE: usize = 2048;

/// Anything that can hand out a record's signal, channels × samples, with
/// rows in the order of `channel_names`.
pub trait SignalSource {
    fn load_signal(&self, record_name: &str, channel_names: &[String]) -> Result<Array2<f64>>;
}

/// Dense windowed dataset.
///
/// `features` is (windows, channels, window_size), `labels` is one-hot
/// (windows, classes). `record_ids` names the source record of each window
/// when requested, and is empty otherwise.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    pub features: Array3<f32>,
    pub labels: Array2<f32>,
    pub record_ids: Vec<String>,
}

/// Number of whole windows in a signal; the trailing partial window is dropped.
pub fn windows_in(signal_length: usize, window_size: usize) -> usize {
    if window_size == 0 {
        0
    } else {
        signal_length / window_size
    }
}

/// Slices every entry's signal into non-overlapping windows.
///
/// Runs in two passes: the first sums the per-record window counts from the
/// catalog and allocates the output arrays at their final size, the second
/// loads each signal and fills its windows in catalog order. Windows never
/// cross record boundaries and records shorter than one window contribute
/// nothing.
///
/// # Errors
///
/// * `EcgError::InvalidConfig` - `window_size` is 0
/// * `EcgError::UnknownLabel` - An entry's label is not in `label_map`
/// * `EcgError::ShapeMismatch` - A loaded signal disagrees with its catalog length
/// * `EcgError::LengthMismatch` - A loaded signal has the wrong channel count
pub fn build_dataset<S: SignalSource + ?Sized>(
    entries: &[CatalogEntry],
    source: &S,
    channel_names: &[String],
    label_map: &LabelMap,
    include_record_ids: bool,
    window_size: usize,
) -> Result<WindowedDataset> {
    if window_size == 0 {
        return Err(EcgError::InvalidConfig(
            "window size must be positive".to_string(),
        ));
    }

    // 第一遍：统计窗口总数并预分配
    let total: usize = entries
        .iter()
        .map(|e| windows_in(e.signal_length, window_size))
        .sum();
    let num_channels = channel_names.len();

    let mut features = Array3::<f32>::zeros((total, num_channels, window_size));
    let mut labels = Array2::<f32>::zeros((total, label_map.len()));
    let mut record_ids = Vec::with_capacity(if include_record_ids { total } else { 0 });

    log::info!(
        "building {} windows of {}×{} from {} records",
        total,
        num_channels,
        window_size,
        entries.len()
    );

    // 第二遍：读取信号并填充
    let mut offset = 0;
    for entry in entries {
        let class = label_map
            .index_of(&entry.label)
            .ok_or_else(|| EcgError::UnknownLabel(entry.label.clone()))?;

        let n = windows_in(entry.signal_length, window_size);
        if n == 0 {
            log::debug!("{}: shorter than one window, skipped", entry.record_name);
            continue;
        }

        let signal = source.load_signal(&entry.record_name, channel_names)?;
        if signal.ncols() != entry.signal_length {
            return Err(EcgError::ShapeMismatch {
                record: entry.record_name.clone(),
                expected: entry.signal_length,
                actual: signal.ncols(),
            });
        }
        if signal.nrows() != num_channels {
            return Err(EcgError::LengthMismatch {
                what: format!("{} channels", entry.record_name),
                expected: num_channels,
                actual: signal.nrows(),
            });
        }

        for i in 0..n {
            let window = signal.slice(s![.., i * window_size..(i + 1) * window_size]);
            features
                .slice_mut(s![offset + i, .., ..])
                .assign(&window.mapv(|v| v as f32));
        }
        labels
            .slice_mut(s![offset..offset + n, class])
            .fill(1.0);

        if include_record_ids {
            record_ids.extend(std::iter::repeat(entry.record_name.clone()).take(n));
        }

        log::debug!("{}: {} windows at offset {}", entry.record_name, n, offset);
        offset += n;
    }

    Ok(WindowedDataset {
        features,
        labels,
        record_ids,
    })
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.features.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_channels(&self) -> usize {
        self.features.len_of(Axis(1))
    }

    pub fn window_size(&self) -> usize {
        self.features.len_of(Axis(2))
    }

    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    /// Class index of every window (argmax of its one-hot row).
    pub fn class_indices(&self) -> Vec<usize> {
        argmax_rows(&self.labels)
    }

    /// Windows per class.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for class in self.class_indices() {
            counts[class] += 1;
        }
        counts
    }

    /// Permutes windows, labels and record ids with one seeded permutation.
    pub fn shuffle(&mut self, seed: u64) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        self.features = self.features.select(Axis(0), &order);
        self.labels = self.labels.select(Axis(0), &order);
        if !self.record_ids.is_empty() {
            self.record_ids = order.iter().map(|&i| self.record_ids[i].clone()).collect();
        }
    }
}

/// Index of the first maximum in each row.
pub fn argmax_rows(labels: &Array2<f32>) -> Vec<usize> {
    labels
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}
