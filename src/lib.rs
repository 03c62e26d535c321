//! # ecgwin
//!
//! Patient-level windowed ECG datasets from WFDB databases such as the PTB
//! Diagnostic ECG Database, with a pluggable classifier and record-level
//! evaluation.
//!
//! The pipeline:
//!
//! 1. read every record header listed in `RECORDS` and build a [`Catalog`]
//!    of `{record, patient, label, length}`;
//! 2. split patients (never records) into train and test groups per label;
//! 3. cut each record's signal into non-overlapping windows of
//!    `window_size` samples, producing dense `(windows, channels, samples)`
//!    tensors with one-hot labels;
//! 4. weight windows by class rarity and fit a [`Classifier`];
//! 5. evaluate per window, then per record by averaging window predictions.
//!
//! ## Quick Start
//!
//! ### Cataloging a database
//!
//! ```rust
//! use ecgwin::{Database, MissingLabelPolicy, Result};
//! use ecgwin::catalog::build_catalog;
//!
//! fn main() -> Result<()> {
//!     # let dir = std::env::temp_dir().join("ecgwin_doc_lib_catalog");
//!     # ecgwin::doctest_utils::create_test_database(&dir, 2, 2, 4096)?;
//!     let db = Database::open(&dir)?;
//!     let names = db.record_names()?;
//!     let catalog = build_catalog(&db, &names, MissingLabelPolicy::Error)?;
//!
//!     for (label, count) in catalog.label_counts() {
//!         println!("{}: {} records", label, count);
//!     }
//!     assert_eq!(catalog.len(), 8);
//!     assert_eq!(catalog.channel_names(), ["i", "ii", "v1"]);
//!     # std::fs::remove_dir_all(&dir).ok();
//!     Ok(())
//! }
//! ```
//!
//! ### Building windows for the test patients
//!
//! ```rust
//! use ecgwin::{build_dataset, sample_weights, Database, LabelMap, MissingLabelPolicy, Result};
//! use ecgwin::catalog::build_catalog;
//! use ecgwin::split::split_patients;
//!
//! fn main() -> Result<()> {
//!     # let dir = std::env::temp_dir().join("ecgwin_doc_lib_windows");
//!     # ecgwin::doctest_utils::create_test_database(&dir, 5, 1, 3 * 512)?;
//!     let db = Database::open(&dir)?;
//!     let catalog = build_catalog(&db, &db.record_names()?, MissingLabelPolicy::Error)?;
//!
//!     let labels = LabelMap::new(["Healthy control", "Myocardial infarction"])?;
//!     labels.validate_against(&catalog)?;
//!     let split = split_patients(&catalog, &labels, 0.2, ecgwin::DEFAULT_SEED)?;
//!
//!     let test = split.test_records(&catalog, &labels);
//!     let dataset = build_dataset(&test, &db, catalog.channel_names(), &labels, true, 512)?;
//!
//!     // one test patient per label, 3 windows each
//!     assert_eq!(dataset.features.dim(), (6, 3, 512));
//!     assert_eq!(dataset.record_ids.len(), 6);
//!
//!     let weights = sample_weights(&dataset.labels);
//!     assert_eq!(weights.to_vec(), vec![0.5; 6]);
//!     # std::fs::remove_dir_all(&dir).ok();
//!     Ok(())
//! }
//! ```
//!
//! ### Physical units
//!
//! WFDB stores raw ADC values; a signal's gain and baseline map them to
//! physical units.
//!
//! ```rust
//! use ecgwin::SignalSpec;
//!
//! let mut signal = SignalSpec::new("s0010_re.dat", "i", 2000.0, "mV");
//! signal.baseline = 0;
//!
//! assert_eq!(signal.to_physical(1000), 0.5);
//! assert_eq!(signal.to_digital(0.5), 1000);
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod reader;
pub mod writer;
pub mod database;
pub mod catalog;
pub mod label;
pub mod split;
pub mod window;
pub mod weights;
pub mod train;
pub mod baseline;
pub mod eval;
pub mod config;
pub mod pipeline;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{EcgError, Result};
pub use types::{RecordHeader, SignalSpec};
pub use reader::RecordReader;
pub use writer::RecordWriter;
pub use database::Database;
pub use catalog::{Catalog, CatalogEntry, MissingLabelPolicy};
pub use label::LabelMap;
pub use split::PatientSplit;
pub use window::{build_dataset, SignalSource, WindowedDataset};
pub use weights::sample_weights;
pub use train::{Classifier, TrainConfig, TrainReport};
pub use baseline::WindowStatsClassifier;
pub use eval::{evaluate, EvaluationReport};
pub use config::RunConfig;

// Defaults shared by the library and the command line
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 1337;

/// Library version
///
/// ```rust
/// let version = ecgwin::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
