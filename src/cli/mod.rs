//! Command-line parsing for the NEO hazard predictor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the model/explainer code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{ExplainConfig, ExplainTarget, FeatureInput, FeatureSelection, INPUT_FIELDS};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "neo", version, about = "Near-Earth Object hazard predictor with local explanations")]
pub struct Cli {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify one NEO and print the verdict plus its local explanation.
    Predict(PredictArgs),
    /// Show the model manifest and which types are not trusted, without loading the model.
    Inspect,
    /// Input form only; the predict action is not wired to a model.
    Preview,
    /// Launch the interactive TUI.
    ///
    /// This uses the same prediction pipeline as `neo predict`, but renders the
    /// form and results in a terminal UI using Ratatui.
    Tui(TuiArgs),
}

/// Where the model and reference dataset live.
#[derive(Debug, Args, Clone, Default)]
pub struct AssetArgs {
    /// Reference dataset CSV (overrides NEO_DATA_PATH).
    #[arg(long, global = true, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Model artifact JSON (overrides NEO_MODEL_PATH).
    #[arg(long, global = true, value_name = "JSON")]
    pub model: Option<PathBuf>,

    /// Trust an extra type name in the model manifest. Repeatable.
    #[arg(long = "trust", global = true, value_name = "TYPE")]
    pub trust: Vec<String>,
}

/// The four NEO features.
#[derive(Debug, Args, Clone)]
pub struct FeatureArgs {
    /// Absolute magnitude (H).
    #[arg(short = 'm', long, default_value_t = INPUT_FIELDS[0].default, allow_negative_numbers = true)]
    pub absolute_magnitude: f64,

    /// Estimated maximum diameter (km).
    #[arg(short = 'd', long, default_value_t = INPUT_FIELDS[1].default, allow_negative_numbers = true)]
    pub estimated_diameter_max: f64,

    /// Relative velocity (km/h).
    #[arg(short = 'r', long, default_value_t = INPUT_FIELDS[2].default, allow_negative_numbers = true)]
    pub relative_velocity: f64,

    /// Miss distance in raw kilometers (log-scaled internally).
    #[arg(short = 'x', long, default_value_t = INPUT_FIELDS[3].default, allow_negative_numbers = true)]
    pub miss_distance: f64,
}

impl FeatureArgs {
    pub fn to_input(&self) -> FeatureInput {
        FeatureInput {
            absolute_magnitude: self.absolute_magnitude,
            estimated_diameter_max: self.estimated_diameter_max,
            relative_velocity: self.relative_velocity,
            miss_distance: self.miss_distance,
        }
    }
}

/// Local explainer settings.
#[derive(Debug, Args, Clone)]
pub struct ExplainArgs {
    /// Number of features in the explanation.
    #[arg(long, default_value_t = 4)]
    pub num_features: usize,

    /// Neighborhood size (including the instance).
    #[arg(long, default_value_t = 5000)]
    pub num_samples: usize,

    /// Random seed for neighborhood sampling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Kernel width (default: 0.75 * sqrt(number of features)).
    #[arg(long)]
    pub kernel_width: Option<f64>,

    /// Which class the explanation attributes.
    #[arg(long, value_enum, default_value_t = ExplainTarget::Hazardous)]
    pub explain: ExplainTarget,

    /// Feature selection method for the surrogate.
    #[arg(long, value_enum, default_value_t = FeatureSelection::Auto)]
    pub feature_selection: FeatureSelection,
}

impl ExplainArgs {
    pub fn to_config(&self) -> ExplainConfig {
        ExplainConfig {
            num_features: self.num_features,
            num_samples: self.num_samples,
            seed: self.seed,
            kernel_width: self.kernel_width,
            target: self.explain,
            feature_selection: self.feature_selection,
        }
    }
}

/// Options for `neo predict`.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub features: FeatureArgs,

    #[command(flatten)]
    pub explain: ExplainArgs,

    /// Disable the terminal contribution chart.
    #[arg(long)]
    pub no_plot: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 60)]
    pub width: usize,

    /// Write a self-contained HTML report.
    #[arg(long, value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Write prediction + explanation as JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

/// Options for `neo tui`: starting values for the form.
#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub features: FeatureArgs,

    #[command(flatten)]
    pub explain: ExplainArgs,

    /// Where `h` writes the HTML report.
    #[arg(long, value_name = "PATH", default_value = "neo_explanation.html")]
    pub html: PathBuf,
}
