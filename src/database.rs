use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::{EcgError, Result};
use crate::reader::RecordReader;
use crate::window::SignalSource;

/// Name of the index file listing every record of a WFDB database.
pub const RECORDS_FILE: &str = "RECORDS";

/// A WFDB database on local disk.
///
/// The directory holds a `RECORDS` index with one record name per line and
/// the record files themselves, possibly in per-patient subdirectories.
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
}

impl Database {
    /// # Errors
    ///
    /// * `EcgError::FileNotFound` - `root` is not a directory
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(EcgError::FileNotFound(format!(
                "{}: not a directory",
                root.display()
            )));
        }

        Ok(Database {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record names from the `RECORDS` index, in file order.
    pub fn record_names(&self) -> Result<Vec<String>> {
        let path = self.root.join(RECORDS_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_end_matches('/').to_string())
            .collect())
    }

    pub fn open_record(&self, record_name: &str) -> Result<RecordReader> {
        RecordReader::open(&self.root, record_name)
    }
}

impl SignalSource for Database {
    fn load_signal(&self, record_name: &str, channel_names: &[String]) -> Result<Array2<f64>> {
        self.open_record(record_name)?.read_signals(channel_names)
    }
}
