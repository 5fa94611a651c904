mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::EvPlotApp;
use clap::{Parser, ValueEnum};
use eframe::egui;

use evplot::{SuffixPolicy, SuffixScheme};
use state::AppState;

/// Plot columns and derived quantities from Phantom `.ev` files.
#[derive(Parser, Debug)]
#[command(name = "evplot", version, about)]
struct Cli {
    /// `.ev` files to load on startup, in disambiguation order
    files: Vec<PathBuf>,

    /// How keys from different files are told apart
    #[arg(long, value_enum, default_value_t = SchemeArg::Letters)]
    suffix_scheme: SchemeArg,

    /// Suffix keys from a single file as well (`1a` rather than `1`)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    always_suffix: bool,

    /// Catalog index of the initial x-axis unit
    #[arg(long, default_value_t = 0)]
    x_unit: usize,

    /// Catalog index of the initial y-axis unit
    #[arg(long, default_value_t = 18)]
    y_unit: usize,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemeArg {
    /// a, b, ..., z, aa, ab, ...
    Letters,
    /// #1, #2, ...
    Numbers,
}

impl From<SchemeArg> for SuffixScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Letters => SuffixScheme::Letters,
            SchemeArg::Numbers => SuffixScheme::Numbers,
        }
    }
}

fn main() -> eframe::Result {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let policy = if cli.always_suffix {
        SuffixPolicy::Always
    } else {
        SuffixPolicy::WhenMerging
    };
    let mut state = AppState::new(cli.suffix_scheme.into(), policy);
    state.set_units(cli.x_unit, cli.y_unit);
    if !cli.files.is_empty() {
        state.load_paths(&cli.files);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "evplot – Phantom .ev viewer",
        options,
        Box::new(|_cc| Ok(Box::new(EvPlotApp::new(state)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["evplot", "a.ev", "b.ev"]).unwrap();
        assert_eq!(cli.files.len(), 2);
        assert!(matches!(cli.suffix_scheme, SchemeArg::Letters));
        assert!(cli.always_suffix);
        assert_eq!((cli.x_unit, cli.y_unit), (0, 18));
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::try_parse_from([
            "evplot",
            "--suffix-scheme",
            "numbers",
            "--always-suffix",
            "false",
            "--y-unit",
            "19",
            "-v",
        ])
        .unwrap();
        assert!(matches!(cli.suffix_scheme, SchemeArg::Numbers));
        assert!(!cli.always_suffix);
        assert_eq!(cli.y_unit, 19);
        assert!(cli.verbose);
    }
}
