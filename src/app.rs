//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves asset paths (defaults, `.env`, flags)
//! - loads the session once
//! - runs predictions and prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::debug;

use crate::cli::{Cli, Command, PredictArgs, TuiArgs};
use crate::data::{AssetConfig, Session};
use crate::domain::FeatureInput;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `neo` binary.
pub fn run() -> Result<(), AppError> {
    // We want `neo` and `neo -m 21.5` to behave like `neo tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    let tui = matches!(cli.command, Command::Tui(_) | Command::Preview);
    crate::logging::init(cli.verbose, tui);

    let assets = AssetConfig::from_env().with_overrides(
        cli.assets.data.as_deref(),
        cli.assets.model.as_deref(),
        &cli.assets.trust,
    );
    debug!(?assets, "resolved asset configuration");

    match cli.command {
        Command::Predict(args) => handle_predict(&assets, args),
        Command::Inspect => handle_inspect(&assets),
        Command::Preview => handle_preview(),
        Command::Tui(args) => handle_tui(&assets, args),
    }
}

fn handle_predict(assets: &AssetConfig, args: PredictArgs) -> Result<(), AppError> {
    let session = Session::load(assets)?;
    let input = args.features.to_input();
    validate_input(&input)?;
    let config = args.explain.to_config();

    let output = pipeline::run_prediction(&session, &input, &config)?;

    println!("{}", crate::report::format_session_summary(&session));
    println!("{}", crate::report::format_prediction(&output));
    println!("{}", crate::report::format_explanation(&output.explanation));
    if !args.no_plot {
        println!(
            "{}",
            crate::plot::render_contribution_bars(&output.explanation, args.width)
        );
    }

    // Optional exports.
    if let Some(path) = &args.html {
        crate::io::export::write_html_report(path, &output)?;
        println!("Wrote HTML report: {}", path.display());
    }
    if let Some(path) = &args.json {
        crate::io::export::write_prediction_json(path, &output)?;
        println!("Wrote JSON: {}", path.display());
    }

    Ok(())
}

fn handle_inspect(assets: &AssetConfig) -> Result<(), AppError> {
    let manifest = crate::io::model_file::read_manifest(&assets.model_path)?;
    print!(
        "{}",
        crate::report::format_inspect(&assets.model_path, &manifest, &assets.trust_list())
    );
    Ok(())
}

fn handle_preview() -> Result<(), AppError> {
    crate::tui::run(crate::tui::App::placeholder(FeatureInput::default()))
}

fn handle_tui(assets: &AssetConfig, args: TuiArgs) -> Result<(), AppError> {
    // Load before taking over the terminal so load errors print normally.
    let session = Session::load(assets)?;
    let input = args.features.to_input();
    validate_input(&input)?;
    let app = crate::tui::App::new(session, input, args.explain.to_config(), args.html);
    crate::tui::run(app)
}

fn validate_input(input: &FeatureInput) -> Result<(), AppError> {
    let values = [
        input.absolute_magnitude,
        input.estimated_diameter_max,
        input.relative_velocity,
        input.miss_distance,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::input("Feature values must be finite numbers."));
    }
    Ok(())
}

/// Rewrite argv so `neo` defaults to `neo tui`.
///
/// Rules:
/// - `neo`                      -> `neo tui`
/// - `neo -m 21.5 ...`          -> `neo tui -m 21.5 ...`
/// - `neo --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "predict" | "inspect" | "preview" | "tui");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_tui() {
        assert_eq!(rewrite_args(args(&["neo"])), args(&["neo", "tui"]));
        assert_eq!(
            rewrite_args(args(&["neo", "-m", "21.5"])),
            args(&["neo", "tui", "-m", "21.5"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for argv in [
            args(&["neo", "predict", "--seed", "7"]),
            args(&["neo", "inspect"]),
            args(&["neo", "preview"]),
            args(&["neo", "--help"]),
            args(&["neo", "-V"]),
        ] {
            assert_eq!(rewrite_args(argv.clone()), argv);
        }
    }

    #[test]
    fn rewritten_args_parse() {
        let cli = Cli::parse_from(rewrite_args(args(&["neo", "--data", "x.csv"])));
        assert!(matches!(cli.command, Command::Tui(_)));
        assert_eq!(cli.assets.data, Some(std::path::PathBuf::from("x.csv")));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let input = FeatureInput {
            relative_velocity: f64::NAN,
            ..FeatureInput::default()
        };
        assert_eq!(validate_input(&input).unwrap_err().exit_code(), crate::error::EXIT_INPUT);
        assert!(validate_input(&FeatureInput::default()).is_ok());
    }
}
