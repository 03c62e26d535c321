use std::fmt;

use serde::Serialize;

use crate::catalog::{build_catalog, Catalog};
use crate::config::RunConfig;
use crate::database::Database;
use crate::error::Result;
use crate::eval::{evaluate, EvaluationReport};
use crate::label::LabelMap;
use crate::split::{split_patients, PatientSplit};
use crate::train::{Classifier, TrainReport};
use crate::weights::sample_weights;
use crate::window::{build_dataset, WindowedDataset};

/// Database, catalog, label map and patient split of one run.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub database: Database,
    pub catalog: Catalog,
    pub label_map: LabelMap,
    pub split: PatientSplit,
}

impl Prepared {
    /// Training windows, shuffled with `seed`, without record ids.
    pub fn train_set(&self, window_size: usize, seed: u64) -> Result<WindowedDataset> {
        let entries = self.split.train_records(&self.catalog, &self.label_map);
        let mut dataset = build_dataset(
            &entries,
            &self.database,
            self.catalog.channel_names(),
            &self.label_map,
            false,
            window_size,
        )?;
        dataset.shuffle(seed);
        Ok(dataset)
    }

    /// Test windows in catalog order, tagged with their record ids.
    pub fn test_set(&self, window_size: usize) -> Result<WindowedDataset> {
        let entries = self.split.test_records(&self.catalog, &self.label_map);
        build_dataset(
            &entries,
            &self.database,
            self.catalog.channel_names(),
            &self.label_map,
            true,
            window_size,
        )
    }
}

/// Opens the database, catalogs it and splits its patients.
///
/// Every selected label must occur in the catalog; this is checked before
/// any signal is read.
pub fn prepare(config: &RunConfig) -> Result<Prepared> {
    config.validate_dataset()?;

    let database = Database::open(config.database_dir())?;
    let record_names = database.record_names()?;
    log::info!(
        "{}: {} records listed",
        database.root().display(),
        record_names.len()
    );

    let catalog = build_catalog(&database, &record_names, config.missing_label)?;
    let label_map = config.label_map()?;
    label_map.validate_against(&catalog)?;

    let split = split_patients(&catalog, &label_map, config.test_fraction, config.seed)?;

    Ok(Prepared {
        database,
        catalog,
        label_map,
        split,
    })
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub records: usize,
    pub train_patients: usize,
    pub test_patients: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    pub training: TrainReport,
    pub evaluation: EvaluationReport,
}

/// Runs catalog, split, windowing, training and evaluation in sequence.
///
/// ```rust
/// use ecgwin::{pipeline, RunConfig, WindowStatsClassifier};
///
/// # let dir = std::env::temp_dir().join("ecgwin_doc_pipeline");
/// # ecgwin::doctest_utils::create_test_database(&dir.join("ptbdb"), 3, 1, 1024)?;
/// let config = RunConfig {
///     data_dir: dir.clone(),
///     window_size: 256,
///     epochs: 2,
///     models_dir: dir.join("models"),
///     log_dir: dir.join("logs"),
///     ..RunConfig::default()
/// };
///
/// let summary = pipeline::run(&config, &mut WindowStatsClassifier::new())?;
/// assert_eq!(summary.train_patients + summary.test_patients, 6);
/// println!("{}", summary);
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub fn run<C: Classifier + ?Sized>(config: &RunConfig, classifier: &mut C) -> Result<RunSummary> {
    config.validate()?;
    let prepared = prepare(config)?;

    let train = prepared.train_set(config.window_size, config.seed)?;
    let weights = sample_weights(&train.labels);
    log::info!(
        "train set: {} windows, per class {:?}",
        train.len(),
        train.class_counts()
    );

    let training = classifier.fit(&train.features, &train.labels, &weights, &config.train_config())?;

    let test = prepared.test_set(config.window_size)?;
    if test.is_empty() {
        log::warn!("test set has no windows");
    }
    let predicted = classifier.predict_classes(&test.features)?;
    let evaluation = evaluate(
        &prepared.label_map,
        &test.class_indices(),
        &predicted,
        &test.record_ids,
    )?;

    Ok(RunSummary {
        records: prepared.catalog.len(),
        train_patients: prepared.split.train.len(),
        test_patients: prepared.split.test.len(),
        train_windows: train.len(),
        test_windows: test.len(),
        training,
        evaluation,
    })
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records cataloged: {}", self.records)?;
        writeln!(
            f,
            "Patients: {} train, {} test",
            self.train_patients, self.test_patients
        )?;
        writeln!(
            f,
            "Windows: {} train, {} test",
            self.train_windows, self.test_windows
        )?;
        if let Some(loss) = self.training.final_loss() {
            writeln!(
                f,
                "Final loss: {:.5} after {} epochs",
                loss,
                self.training.epoch_losses.len()
            )?;
        }
        writeln!(f, "Run log: {}", self.training.run_dir.display())?;
        write!(f, "{}", self.evaluation)
    }
}
