use std::cmp::max;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use ecgwin::catalog::build_catalog;
use ecgwin::pipeline::{self, prepare};
use ecgwin::{Database, RunConfig, WindowStatsClassifier};

/// Patient-level windowed ECG classification on WFDB databases.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// YAML run configuration. Flags below override its values.
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Directory holding the database folder.
    #[arg(global = true, long)]
    data_dir: Option<PathBuf>,

    /// Database folder name inside the data directory.
    #[arg(global = true, long)]
    database: Option<String>,

    /// Selected label, repeatable. The first is class 0.
    #[arg(global = true, long = "label")]
    labels: Vec<String>,

    #[arg(global = true, long)]
    seed: Option<u64>,

    #[arg(global = true, long)]
    window_size: Option<usize>,

    #[arg(global = true, long)]
    test_fraction: Option<f64>,

    #[arg(global = true, long)]
    epochs: Option<usize>,

    #[arg(global = true, long)]
    batch_size: Option<usize>,

    #[arg(global = true, long)]
    learning_rate: Option<f64>,

    /// Enable debug mode. Raises the log level to at least `Debug`.
    #[arg(global = true, long, default_value_t = false)]
    debug: bool,

    /// Set the log level for the application.
    #[arg(global = true, long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Catalog the database and print label counts.
    Catalog {
        /// Print every catalog entry as JSON instead.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the patient-level train/test split as JSON.
    Split,
    /// Build train and test windows and print their shapes.
    Windows,
    /// Train the baseline classifier and evaluate it.
    Run {
        /// Print the run summary as JSON instead.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl GlobalOpts {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(v) = &self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(v) = &self.database {
            config.database = v.clone();
        }
        if !self.labels.is_empty() {
            config.labels = self.labels.clone();
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.test_fraction {
            config.test_fraction = v;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        Ok(config)
    }
}

fn init_logging(opts: &GlobalOpts) -> Result<()> {
    let log_level = if opts.debug {
        max(LevelFilter::Debug, opts.log_level)
    } else {
        opts.log_level
    };

    let mut builder = simplelog::ConfigBuilder::new();
    builder.set_time_level(LevelFilter::Off);
    builder.set_thread_level(LevelFilter::Off);
    builder.set_target_level(if opts.debug {
        LevelFilter::Error
    } else {
        LevelFilter::Off
    });

    TermLogger::init(
        log_level,
        builder.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global_opts)?;

    let config = cli.global_opts.run_config()?;
    log::debug!("configuration: {:?}", config);

    match cli.command {
        Commands::Catalog { json } => {
            config.validate_dataset()?;
            let db = Database::open(config.database_dir())
                .with_context(|| format!("opening database {}", config.database_dir().display()))?;
            let names = db.record_names()?;
            let catalog = build_catalog(&db, &names, config.missing_label)?;

            if json {
                println!("{}", serde_json::to_string_pretty(catalog.entries())?);
            } else {
                println!("{} records, channels {:?}", catalog.len(), catalog.channel_names());
                for (label, count) in catalog.label_counts() {
                    println!("{:>6}  {}", count, label);
                }
            }
        }
        Commands::Split => {
            let prepared = prepare(&config).context("preparing the split")?;
            println!("{}", serde_json::to_string_pretty(&prepared.split)?);
        }
        Commands::Windows => {
            let prepared = prepare(&config).context("preparing the split")?;
            let train = prepared.train_set(config.window_size, config.seed)?;
            let test = prepared.test_set(config.window_size)?;

            for (name, set) in [("train", &train), ("test", &test)] {
                println!(
                    "{}: features {:?}, labels {:?}, per class {:?}",
                    name,
                    set.features.dim(),
                    set.labels.dim(),
                    set.class_counts()
                );
            }
        }
        Commands::Run { json } => {
            let mut classifier = WindowStatsClassifier::new();
            let summary = pipeline::run(&config, &mut classifier).context("running the pipeline")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary);
            }
        }
    }
    Ok(())
}
