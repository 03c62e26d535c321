use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::MissingLabelPolicy;
use crate::error::{EcgError, Result};
use crate::label::LabelMap;
use crate::train::TrainConfig;
use crate::window::DEFAULT_WINDOW_SIZE;

/// Settings of one pipeline run.
///
/// Every field has a default, so a YAML file only needs to name what it
/// changes:
///
/// ```rust
/// use ecgwin::RunConfig;
///
/// let config: RunConfig = serde_yaml::from_str("window_size: 1024\nseed: 7\n").unwrap();
/// assert_eq!(config.window_size, 1024);
/// assert_eq!(config.seed, 7);
/// assert_eq!(config.database, "ptbdb");
/// assert_eq!(config.labels, vec!["Healthy control", "Myocardial infarction"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Database name; its files live in `data_dir/database`.
    pub database: String,
    pub data_dir: PathBuf,
    /// Selected labels, in class order.
    pub labels: Vec<String>,
    pub test_fraction: f64,
    pub window_size: usize,
    pub seed: u64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub models_dir: PathBuf,
    pub log_dir: PathBuf,
    pub model_name: String,
    pub missing_label: MissingLabelPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            database: "ptbdb".to_string(),
            data_dir: PathBuf::from("data"),
            labels: vec![
                "Healthy control".to_string(),
                "Myocardial infarction".to_string(),
            ],
            test_fraction: crate::DEFAULT_TEST_FRACTION,
            window_size: DEFAULT_WINDOW_SIZE,
            seed: crate::DEFAULT_SEED,
            epochs: 50,
            batch_size: 512,
            learning_rate: 0.01,
            models_dir: PathBuf::from("models"),
            log_dir: PathBuf::from("tensorlogs"),
            model_name: "two_classes".to_string(),
            missing_label: MissingLabelPolicy::Error,
        }
    }
}

impl RunConfig {
    /// Reads a YAML config file.
    ///
    /// # Errors
    ///
    /// * `EcgError::FileNotFound` - The file cannot be read
    /// * `EcgError::InvalidConfig` - The YAML is malformed or names an unknown field
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| EcgError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: RunConfig = serde_yaml::from_str(&text)
            .map_err(|e| EcgError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Directory of the selected database.
    pub fn database_dir(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    pub fn label_map(&self) -> Result<LabelMap> {
        LabelMap::new(self.labels.iter().cloned())
    }

    /// Checks everything a full run needs, including exactly two labels.
    pub fn validate(&self) -> Result<()> {
        self.validate_dataset()?;
        if self.labels.len() != 2 {
            return Err(EcgError::UnsupportedClassCount(self.labels.len()));
        }
        self.train_config().validate()
    }

    /// Checks the settings used up to windowing.
    pub fn validate_dataset(&self) -> Result<()> {
        self.label_map()?;
        if !(0.0..=1.0).contains(&self.test_fraction) {
            return Err(EcgError::InvalidConfig(format!(
                "test_fraction must be within [0, 1], got {}",
                self.test_fraction
            )));
        }
        if self.window_size == 0 {
            return Err(EcgError::InvalidConfig(
                "window_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            checkpoint_dir: self.models_dir.clone(),
            log_dir: self.log_dir.clone(),
            model_name: self.model_name.clone(),
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.database_dir(), Path::new("data").join("ptbdb"));
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.window_size, 2048);
        assert_eq!(config.seed, 1337);
        assert_eq!(config.missing_label, MissingLabelPolicy::Error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = "\
labels:
  - Healthy control
  - Cardiomyopathy
missing_label: skip
epochs: 3
models_dir: out/models
";
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.labels[1], "Cardiomyopathy");
        assert_eq!(config.missing_label, MissingLabelPolicy::Skip);

        let train = config.train_config();
        assert_eq!(train.epochs, 3);
        assert_eq!(train.checkpoint_dir, PathBuf::from("out/models"));
        assert_eq!(train.batch_size, 512);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<RunConfig>("windowsize: 10\n").is_err());
    }

    #[test]
    fn test_validation() {
        let three = RunConfig {
            labels: vec!["a".into(), "b".into(), "c".into()],
            ..RunConfig::default()
        };
        assert!(three.validate_dataset().is_ok());
        assert!(matches!(
            three.validate(),
            Err(EcgError::UnsupportedClassCount(3))
        ));

        let duplicate = RunConfig {
            labels: vec!["a".into(), "a".into()],
            ..RunConfig::default()
        };
        assert!(matches!(
            duplicate.validate(),
            Err(EcgError::DuplicateLabel(_))
        ));

        let bad_fraction = RunConfig {
            test_fraction: 1.5,
            ..RunConfig::default()
        };
        assert!(bad_fraction.validate().is_err());

        let no_epochs = RunConfig {
            epochs: 0,
            ..RunConfig::default()
        };
        assert!(no_epochs.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("ecgwin_config_test.yaml");
        fs::write(&path, "database: ptbdb-mini\nwindow_size: 512\n").unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.database, "ptbdb-mini");
        assert_eq!(config.window_size, 512);
        fs::remove_file(&path).ok();

        assert!(matches!(
            RunConfig::load("/nonexistent/ecgwin.yaml"),
            Err(EcgError::FileNotFound(_))
        ));
    }
}
