//! CLI tool: extract title and outline JSON for every PDF in a directory

use clap::{Parser, ValueEnum};
use pdf_outline::{run_batch, BatchDirs, DedupMode, OutlineExtractor, OutlineOptions, TableStrategy};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "pdf-outline")]
#[command(version)]
#[command(about = "Extract title and H1-H3 outline from PDFs as JSON", long_about = None)]
struct Cli {
    /// Directory of input PDFs (default: app/input, or /app/input with RUN_IN_CONTAINER=1)
    #[arg(value_name = "INPUT_DIR")]
    input: Option<PathBuf>,

    /// Directory receiving one JSON per PDF
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// JSON file with extraction options
    #[arg(short, long, value_name = "FILE", env = "PDF_OUTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Table finder used to suppress headings inside tables
    #[arg(long, value_enum)]
    table_strategy: Option<StrategyArg>,

    /// How repeated headings are collapsed
    #[arg(long, value_enum)]
    dedup: Option<DedupArg>,

    /// Do not apply the builtin page override table
    #[arg(long)]
    no_overrides: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Lines,
    Text,
    Both,
}

impl From<StrategyArg> for TableStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Lines => TableStrategy::Lines,
            StrategyArg::Text => TableStrategy::Text,
            StrategyArg::Both => TableStrategy::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DedupArg {
    Consecutive,
    Global,
}

impl From<DedupArg> for DedupMode {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Consecutive => DedupMode::Consecutive,
            DedupArg::Global => DedupMode::Global,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut options = match &cli.config {
        Some(path) => match OutlineOptions::load_from_file(path) {
            Ok(options) => options,
            Err(e) => {
                log::error!("{}", e);
                process::exit(2);
            }
        },
        None => OutlineOptions::default(),
    };
    if let Some(strategy) = cli.table_strategy {
        options.table_strategy = strategy.into();
    }
    if let Some(dedup) = cli.dedup {
        options.dedup = dedup.into();
    }
    if cli.no_overrides {
        options.builtin_overrides = false;
    }

    let extractor = match OutlineExtractor::new(options) {
        Ok(extractor) => extractor,
        Err(e) => {
            log::error!("{}", e);
            process::exit(2);
        }
    };

    let dirs = BatchDirs::resolve(cli.input, cli.output);
    match run_batch(&dirs.input, &dirs.output, &extractor) {
        Ok(report) if report.is_clean() => {}
        Ok(report) => {
            log::warn!("{} file(s) skipped", report.failed.len());
        }
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    }
}
