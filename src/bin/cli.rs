//! F1 Predictor CLI - Command-line interface for race outcome predictions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use f1_predictor::config::{Settings, StorageSettings};
use f1_predictor::core::{format_standings_table, positions_and_standings, StandingsEntity};
use f1_predictor::data::{
    feature_rows_from_frame, feature_rows_to_frame, filter_season, get_storage, load_csv,
    prediction_rows_from_frame, predictions_to_frame, raw_records_from_frame, seasons_in,
    standings_to_frame, write_csv, Storage,
};
use f1_predictor::evaluation::{predict_season, EvaluationMetrics, ModelTrainer};
use f1_predictor::features::FeaturePipeline;
use f1_predictor::logging::init_logging;
use f1_predictor::models::{FeatureRow, StandingEntry};
use f1_predictor::predictor::{GridBaselineModel, ModelRegistry};

const DEFAULT_FEATURES_NAME: &str = "main_df";
const DATA_SUBDIRS: &[&str] = &["raw", "processed", "models", "cache"];

#[derive(Parser)]
#[command(name = "f1-predictor")]
#[command(author, version, about = "F1 race outcome prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (overrides configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory layout
    Init,

    /// Build the feature table from a raw merged results CSV
    Features {
        /// Raw results CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset name in storage
        #[arg(long, default_value = DEFAULT_FEATURES_NAME)]
        name: String,

        /// Skip the split-time target
        #[arg(long)]
        no_target: bool,
    },

    /// Train the baseline model and register it as active
    Train {
        /// Season held out for testing (default from configuration)
        #[arg(long)]
        test_season: Option<i32>,

        /// Feature dataset name
        #[arg(long, default_value = DEFAULT_FEATURES_NAME)]
        name: String,
    },

    /// Walk-forward cross-validation by season
    CrossValidate {
        /// Seasons to evaluate, comma separated (default from configuration)
        #[arg(long, value_delimiter = ',')]
        seasons: Vec<i32>,

        /// Feature dataset name
        #[arg(long, default_value = DEFAULT_FEATURES_NAME)]
        name: String,
    },

    /// Predict a season with the active model and show standings
    Predict {
        /// Season to predict
        season: i32,

        /// Write ranked predictions to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of standings rows to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Model version (default: active)
        #[arg(long)]
        model_version: Option<String>,

        /// Feature dataset name
        #[arg(long, default_value = DEFAULT_FEATURES_NAME)]
        name: String,
    },

    /// Standings from an external prediction table
    Standings {
        /// Predictions CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Column holding the predicted gap
        #[arg(long, default_value = "pred")]
        pred_column: String,

        /// Number of standings rows to show
        #[arg(long)]
        top: Option<usize>,

        /// Save driver/constructor standings to storage
        #[arg(long)]
        save: bool,
    },

    /// List registered model versions
    Models {
        /// Make this version active
        #[arg(long)]
        activate: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("Failed to load configuration")?;
    let level = if cli.verbose {
        "DEBUG"
    } else {
        settings.log_level.as_str()
    };
    init_logging(level).context("Failed to initialise logging")?;

    let storage_settings = match &cli.data_dir {
        Some(dir) => settings.storage.with_data_dir(&dir.to_string_lossy()),
        None => settings.storage.clone(),
    };

    println!("{}", "F1 Predictor CLI v0.2.0".cyan().bold());
    println!();

    let Some(command) = cli.command else {
        println!("Use --help for usage information.");
        return Ok(());
    };

    match command {
        Commands::Init => run_init(&storage_settings),
        Commands::Features {
            input,
            name,
            no_target,
        } => run_features(&storage_settings, &input, &name, !no_target),
        Commands::Train { test_season, name } => run_train(
            &storage_settings,
            &name,
            test_season.unwrap_or(settings.model.test_season),
            settings.model.train_seasons_start,
        ),
        Commands::CrossValidate { seasons, name } => {
            let seasons = if seasons.is_empty() {
                settings.model.cv_seasons.clone()
            } else {
                seasons
            };
            run_cross_validate(&storage_settings, &name, &seasons)
        }
        Commands::Predict {
            season,
            output,
            top,
            model_version,
            name,
        } => run_predict(
            &storage_settings,
            &name,
            season,
            output.as_deref(),
            top,
            model_version.as_deref(),
        ),
        Commands::Standings {
            input,
            pred_column,
            top,
            save,
        } => run_standings(&storage_settings, &input, &pred_column, top, save),
        Commands::Models { activate } => run_models(&storage_settings, activate.as_deref()),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    Ok(pb)
}

fn load_features(storage: &dyn Storage, name: &str) -> Result<Vec<FeatureRow>> {
    let df = storage
        .load_frame(name)
        .with_context(|| format!("Failed to load feature dataset '{}'", name))?;
    let rows = feature_rows_from_frame(&df)
        .with_context(|| format!("Dataset '{}' is not a feature table", name))?;
    Ok(rows)
}

fn print_metrics(label: &str, metrics: &EvaluationMetrics) {
    println!(
        "{:<8} {:>9.4} {:>9.4} {:>9.4} {:>9.2} {:>8.3}",
        label, metrics.spearman, metrics.pearson, metrics.r2, metrics.mse, metrics.rmse
    );
}

fn print_standings(title: &str, entries: &[StandingEntry], entity: StandingsEntity, top: Option<usize>) {
    println!("{}", title.yellow().bold());
    print!("{}", format_standings_table(entries, entity, top));
    println!();
}

fn run_init(settings: &StorageSettings) -> Result<()> {
    let root = Path::new(&settings.data_dir);
    for sub in DATA_SUBDIRS {
        let dir = root.join(sub);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        println!("{}: {:?}", "Created".green(), dir);
    }
    Ok(())
}

fn run_features(settings: &StorageSettings, input: &Path, name: &str, include_target: bool) -> Result<()> {
    println!("{}: {:?}", "Building features from".green(), input);

    let pb = spinner("Loading raw results...")?;
    let raw = load_csv(input).with_context(|| format!("Failed to load CSV from {:?}", input))?;
    let records = raw_records_from_frame(&raw).context("Raw table does not match the expected schema")?;

    pb.set_message("Engineering features...");
    let pipeline = FeaturePipeline::new(include_target);
    let rows = pipeline.transform(&records).context("Feature pipeline failed")?;
    let mut df = feature_rows_to_frame(&rows, include_target)?;

    let storage = get_storage(settings);
    storage.save_frame(&mut df, name)?;
    pb.finish_and_clear();

    println!(
        "{}: {} rows x {} columns -> '{}'",
        "Saved".green(),
        df.height(),
        df.width(),
        name
    );
    println!("Seasons: {:?}", seasons_in(&df)?);
    Ok(())
}

fn run_train(settings: &StorageSettings, name: &str, test_season: i32, start_season: i32) -> Result<()> {
    println!("{} (test season {})", "Training model...".green(), test_season);

    let storage = get_storage(settings);
    let features: Vec<FeatureRow> = load_features(storage.as_ref(), name)?
        .into_iter()
        .filter(|r| r.season >= start_season)
        .collect();

    let registry = ModelRegistry::new(&settings.models_dir)
        .with_context(|| format!("Failed to open model registry at {}", settings.models_dir))?;
    let mut trainer = ModelTrainer::with_registry(registry);

    let pb = spinner("Fitting model...")?;
    let report = trainer.train(&features, test_season).context("Training failed")?;
    pb.finish_and_clear();

    println!();
    println!("{}", "Results:".yellow().bold());
    println!("Model: {}", report.model_name);
    println!("Train samples: {}", report.train_samples);
    println!("Test samples: {}", report.test_samples);
    println!();
    println!(
        "{:<8} {:>9} {:>9} {:>9} {:>9} {:>8}",
        "Split", "Spearman", "Pearson", "R²", "MSE", "RMSE"
    );
    println!("{}", "-".repeat(57));
    print_metrics("Train", &report.train_metrics);
    print_metrics("Test", &report.test_metrics);
    println!();

    let acc = &report.position_accuracy;
    println!(
        "Position accuracy: exact {:.1}%, ±1 {:.1}%, ±2 {:.1}%, ±3 {:.1}%",
        acc.exact * 100.0,
        acc.within_1 * 100.0,
        acc.within_2 * 100.0,
        acc.within_3 * 100.0
    );
    println!();

    print_standings(
        &format!("Predicted Driver Standings {}:", test_season),
        &report.top_drivers,
        StandingsEntity::Driver,
        None,
    );
    print_standings(
        &format!("Predicted Constructor Standings {}:", test_season),
        &report.top_constructors,
        StandingsEntity::Constructor,
        None,
    );

    if let Some(version) = &report.version {
        println!("{}: {}", "Registered model version".green(), version);
    }
    Ok(())
}

fn run_cross_validate(settings: &StorageSettings, name: &str, seasons: &[i32]) -> Result<()> {
    if seasons.is_empty() {
        bail!("No seasons to cross-validate");
    }
    println!("{}: {:?}", "Cross-validating seasons".green(), seasons);

    let storage = get_storage(settings);
    let features = load_features(storage.as_ref(), name)?;

    let pb = spinner("Running folds...")?;
    let report = ModelTrainer::new()
        .cross_validate(&features, seasons)
        .context("Cross-validation failed")?;
    pb.finish_and_clear();

    println!(
        "{:>6} {:>7} {:>6} {:>9} {:>9} {:>9} {:>8}",
        "Season", "Train", "Test", "Spearman", "Pearson", "R²", "RMSE"
    );
    println!("{}", "-".repeat(60));
    for fold in &report.folds {
        println!(
            "{:>6} {:>7} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>8.3}",
            fold.season,
            fold.train_samples,
            fold.test_samples,
            fold.metrics.spearman,
            fold.metrics.pearson,
            fold.metrics.r2,
            fold.metrics.rmse
        );
    }
    println!();
    println!("Mean R²: {:.4}", report.mean_r2);
    println!("Mean RMSE: {:.3}", report.mean_rmse);
    Ok(())
}

fn run_predict(
    settings: &StorageSettings,
    name: &str,
    season: i32,
    output: Option<&Path>,
    top: usize,
    version: Option<&str>,
) -> Result<()> {
    println!("{}: {}", "Predicting season".green(), season);

    let storage = get_storage(settings);
    let df = storage
        .load_frame(name)
        .with_context(|| format!("Failed to load feature dataset '{}'", name))?;
    let season_df = filter_season(&df, season)?;
    if season_df.height() == 0 {
        println!("{}", "No feature rows found for this season.".red());
        println!("Available seasons: {:?}", seasons_in(&df)?);
        return Ok(());
    }
    let features = feature_rows_from_frame(&season_df)
        .with_context(|| format!("Dataset '{}' is not a feature table", name))?;

    let registry = ModelRegistry::new(&settings.models_dir)?;
    let model: GridBaselineModel = registry
        .load_model(version)
        .context("No model available, run `train` first")?;

    let prediction = predict_season(&model, &features, season)?;
    println!("Predicted {} rows", prediction.rows.len());
    println!();

    print_standings(
        &format!("Predicted Driver Standings {}:", season),
        &prediction.drivers,
        StandingsEntity::Driver,
        Some(top),
    );
    print_standings(
        &format!("Predicted Constructor Standings {}:", season),
        &prediction.constructors,
        StandingsEntity::Constructor,
        Some(top),
    );

    let mut df = predictions_to_frame(&prediction.rows)?;
    storage.save_frame(&mut df, &format!("predictions_{}", season))?;
    if let Some(path) = output {
        write_csv(&mut df, path).with_context(|| format!("Failed to write {:?}", path))?;
        println!("{}: {:?}", "Saved".green(), path);
    }
    Ok(())
}

fn run_standings(
    settings: &StorageSettings,
    input: &Path,
    pred_column: &str,
    top: Option<usize>,
    save: bool,
) -> Result<()> {
    println!("{}: {:?}", "Standings from".green(), input);

    let df = load_csv(input).with_context(|| format!("Failed to load CSV from {:?}", input))?;
    let (mut rows, grouping) = prediction_rows_from_frame(&df, pred_column)
        .context("Prediction table does not match the expected schema")?;
    let (drivers, constructors) = positions_and_standings(&mut rows, grouping)?;

    print_standings("Driver Standings:", &drivers, StandingsEntity::Driver, top);
    print_standings(
        "Constructor Standings:",
        &constructors,
        StandingsEntity::Constructor,
        top,
    );

    if save {
        let storage = get_storage(settings);
        storage.save_frame(&mut standings_to_frame(&drivers, "name")?, "driver_standings")?;
        storage.save_frame(
            &mut standings_to_frame(&constructors, "constructor")?,
            "constructor_standings",
        )?;
    }
    Ok(())
}

fn run_models(settings: &StorageSettings, activate: Option<&str>) -> Result<()> {
    let mut registry = ModelRegistry::new(&settings.models_dir)?;
    if let Some(version) = activate {
        registry.set_active(version)?;
        println!("{}: {}", "Active model".green(), version);
        println!();
    }

    let versions = registry.list_versions();
    if versions.is_empty() {
        println!("{}", "No registered models.".yellow());
        return Ok(());
    }

    println!("{:>2} {:<18} {:<32} {:>9}", "", "Version", "Created", "Test R²");
    println!("{}", "-".repeat(64));
    for info in versions {
        let r2 = info
            .metrics
            .get("test_r2")
            .and_then(|v| v.as_f64())
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
        let marker = if info.is_active { "*" } else { "" };
        println!(
            "{:>2} {:<18} {:<32} {:>9}",
            marker, info.version, info.created_at, r2
        );
    }
    Ok(())
}
