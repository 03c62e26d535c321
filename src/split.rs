use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{EcgError, Result};
use crate::label::LabelMap;

/// Disjoint train/test partition of patient ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientSplit {
    pub train: Vec<String>,
    pub test: Vec<String>,
}

impl PatientSplit {
    /// Catalog entries of the training patients, restricted to `label_map`.
    pub fn train_records(&self, catalog: &Catalog, label_map: &LabelMap) -> Vec<CatalogEntry> {
        catalog.records_for_patients(&self.train, label_map)
    }

    /// Catalog entries of the test patients, restricted to `label_map`.
    pub fn test_records(&self, catalog: &Catalog, label_map: &LabelMap) -> Vec<CatalogEntry> {
        catalog.records_for_patients(&self.test, label_map)
    }

    fn contains(&self, patient: &str) -> bool {
        self.train.iter().chain(&self.test).any(|p| p == patient)
    }
}

/// Number of test patients drawn from `patients` candidates.
pub fn test_count(patients: usize, test_fraction: f64) -> usize {
    ((patients as f64 * test_fraction).ceil() as usize).min(patients)
}

/// Splits patients into train and test groups, label by label.
///
/// For each label in `label_map` order, `ceil(n × test_fraction)` of its
/// `n` patients are drawn uniformly without replacement into the test set
/// and the rest go to train. A patient already placed under an earlier
/// label keeps that placement, so the two sets never overlap. The same
/// `seed` always yields the same split.
///
/// ```rust
/// use ecgwin::{Catalog, CatalogEntry, LabelMap};
/// use ecgwin::split::split_patients;
///
/// let entries = (1..=10)
///     .map(|p| CatalogEntry {
///         record_name: format!("patient{:03}/s{:04}_re", p, p),
///         patient_id: format!("patient{:03}", p),
///         label: if p <= 5 { "Healthy control" } else { "Myocardial infarction" }.to_string(),
///         signal_length: 4096,
///     })
///     .collect();
/// let catalog = Catalog::from_entries(entries, vec!["i".to_string()]);
/// let labels = LabelMap::new(["Healthy control", "Myocardial infarction"])?;
///
/// let split = split_patients(&catalog, &labels, 0.2, 1337)?;
/// assert_eq!(split.test.len(), 2); // ceil(5 × 0.2) per label
/// assert_eq!(split.train.len(), 8);
/// assert_eq!(split, split_patients(&catalog, &labels, 0.2, 1337)?);
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub fn split_patients(
    catalog: &Catalog,
    label_map: &LabelMap,
    test_fraction: f64,
    seed: u64,
) -> Result<PatientSplit> {
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(EcgError::InvalidConfig(format!(
            "test fraction must be within [0, 1], got {}",
            test_fraction
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = PatientSplit::default();

    for label in label_map.labels() {
        let patients: Vec<String> = catalog
            .patients_with_label(label)
            .into_iter()
            .filter(|p| !split.contains(p))
            .collect();

        let n_test = test_count(patients.len(), test_fraction);
        let mut chosen = vec![false; patients.len()];
        for i in index::sample(&mut rng, patients.len(), n_test) {
            chosen[i] = true;
            split.test.push(patients[i].clone());
        }
        split.train.extend(
            patients
                .iter()
                .zip(&chosen)
                .filter(|(_, c)| !**c)
                .map(|(p, _)| p.clone()),
        );

        log::info!(
            "'{}': {} patients, {} test, {} train",
            label,
            patients.len(),
            n_test,
            patients.len() - n_test
        );
    }

    Ok(split)
}
