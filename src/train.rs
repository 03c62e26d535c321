use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{EcgError, Result};

/// Sequence classifier seam.
///
/// `fit` consumes one-hot labels and per-window loss weights; `predict_classes`
/// returns one class index per window.
pub trait Classifier {
    fn fit(
        &mut self,
        features: &Array3<f32>,
        labels: &Array2<f32>,
        weights: &Array1<f32>,
        config: &TrainConfig,
    ) -> Result<TrainReport>;

    fn predict_classes(&self, features: &Array3<f32>) -> Result<Vec<usize>>;
}

/// Training loop settings shared by all classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    pub model_name: String,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 50,
            batch_size: 512,
            learning_rate: 0.01,
            checkpoint_dir: PathBuf::from("models"),
            log_dir: PathBuf::from("tensorlogs"),
            model_name: "two_classes".to_string(),
            seed: 1337,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(EcgError::InvalidConfig("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(EcgError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(EcgError::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Outcome of one `fit` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainReport {
    pub epoch_losses: Vec<f64>,
    pub epoch_seconds: Vec<f64>,
    pub checkpoints: Vec<PathBuf>,
    pub run_dir: PathBuf,
}

impl TrainReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Returns `<log_dir>/<model_name>-logs/<n>th_run` and creates it.
///
/// `n` is the number of entries already in the logs folder, so successive
/// runs get `0th_run`, `1th_run`, ...
pub fn next_run_dir(log_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let model_folder = log_dir.join(format!("{}-logs", model_name));
    let existing = if model_folder.is_dir() {
        fs::read_dir(&model_folder)?.count()
    } else {
        0
    };

    let run_dir = model_folder.join(format!("{}th_run", existing));
    fs::create_dir_all(&run_dir)?;
    Ok(run_dir)
}

/// File name of the checkpoint written after `epoch` (1-based).
pub fn checkpoint_file_name(epoch: usize) -> String {
    format!("weights-improvement-{:02}-bigger.json", epoch)
}

/// Saves a checkpoint only when the monitored loss improves (mode min).
#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    dir: PathBuf,
    best: Option<f64>,
}

impl CheckpointPolicy {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        CheckpointPolicy {
            dir: dir.as_ref().to_path_buf(),
            best: None,
        }
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.best
    }

    /// Path to save to when `loss` beats the best so far, else `None`.
    pub fn consider(&mut self, epoch: usize, loss: f64) -> Option<PathBuf> {
        let improved = match self.best {
            None => loss.is_finite(),
            Some(best) => loss < best,
        };
        if !improved {
            return None;
        }

        self.best = Some(loss);
        Some(self.dir.join(checkpoint_file_name(epoch)))
    }
}

/// Wall time of every epoch.
#[derive(Debug, Default)]
pub struct EpochTimer {
    started: Option<Instant>,
    times: Vec<Duration>,
}

impl EpochTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Records the epoch started by the last `begin` and returns its duration.
    pub fn end(&mut self) -> Duration {
        let elapsed = self
            .started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.times.push(elapsed);
        elapsed
    }

    pub fn times(&self) -> &[Duration] {
        &self.times
    }
}

#[derive(Debug, Serialize)]
struct EpochLog {
    epoch: usize,
    loss: f64,
    seconds: f64,
}

/// Bookkeeping around a training loop: run directory, epoch log,
/// timing and save-best checkpoints.
pub struct TrainingSession {
    run_dir: PathBuf,
    log: BufWriter<File>,
    timer: EpochTimer,
    checkpoints: CheckpointPolicy,
    report: TrainReport,
}

impl TrainingSession {
    pub fn start(config: &TrainConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.checkpoint_dir)?;
        let run_dir = next_run_dir(&config.log_dir, &config.model_name)?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.join("epochs.jsonl"))?;

        log::info!("training run logged to {}", run_dir.display());

        Ok(TrainingSession {
            report: TrainReport {
                run_dir: run_dir.clone(),
                ..TrainReport::default()
            },
            run_dir,
            log: BufWriter::new(log),
            timer: EpochTimer::new(),
            checkpoints: CheckpointPolicy::new(&config.checkpoint_dir),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn begin_epoch(&mut self) {
        self.timer.begin();
    }

    /// Closes epoch `epoch` (1-based) with its mean loss. `save` is called
    /// with the checkpoint path when the loss improved.
    pub fn end_epoch<F>(&mut self, epoch: usize, loss: f64, save: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let seconds = self.timer.end().as_secs_f64();
        self.report.epoch_losses.push(loss);
        self.report.epoch_seconds.push(seconds);

        let line = serde_json::to_string(&EpochLog {
            epoch,
            loss,
            seconds,
        })
        .map_err(|e| EcgError::Checkpoint(e.to_string()))?;
        writeln!(self.log, "{}", line)?;

        match self.checkpoints.consider(epoch, loss) {
            Some(path) => {
                save(&path)?;
                log::info!(
                    "epoch {}: loss {:.5} improved, saved {}",
                    epoch,
                    loss,
                    path.display()
                );
                self.report.checkpoints.push(path);
            }
            None => log::info!("epoch {}: loss {:.5} ({:.2}s)", epoch, loss, seconds),
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<TrainReport> {
        self.log.flush()?;
        Ok(self.report)
    }
}
