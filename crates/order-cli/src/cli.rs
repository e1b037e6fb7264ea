//! CLI argument definitions for `order-risk`.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, ColorChoice, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use tracing::level_filters::LevelFilter;

use order_cli::config::{OptionOverrides, parse_assignment};
use order_cli::logging::{LogConfig, LogFormat};
use order_model::MissingKeyPolicy;

#[derive(Parser)]
#[command(
    name = "order-risk",
    version,
    about = "Late-delivery risk predictions for supply-chain orders",
    long_about = "Build a versioned model artifact from a reference order dataset, \
                  then predict late-delivery risk for one order or a whole file.\n\n\
                  Derived features and categorical encodings are fitted once at build \
                  time and applied unchanged at prediction time."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow customer row values in logs (redacted by default).
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl Cli {
    /// `--log-level` wins over `-v`/`-q`; either one disables `RUST_LOG`.
    pub fn log_config(&self) -> LogConfig {
        let with_ansi = match self.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.log_file.is_none() && io::stderr().is_terminal(),
        };
        LogConfig {
            level_filter: self
                .log_level
                .map_or_else(|| self.verbosity.tracing_level_filter(), LevelFilter::from),
            use_env_filter: !(self.verbosity.is_present() || self.log_level.is_some()),
            with_ansi,
            format: self.log_format.into(),
            log_file: self.log_file.clone(),
            log_data: self.log_data,
            ..LogConfig::default()
        }
    }
}

/// Pipeline options; flags override values from `--config`.
#[derive(Args)]
pub struct PipelineArgs {
    /// TOML file with pipeline options.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// What to do when a product or order was never seen at build time.
    #[arg(long = "missing-key", value_enum, global = true)]
    pub missing_key: Option<MissingKeyArg>,

    /// Fail a row whose features include fields the model does not use.
    #[arg(long = "reject-extra-fields", global = true)]
    pub reject_extra_fields: bool,

    /// Rows per predictor call in batch mode.
    #[arg(long = "chunk-size", value_name = "ROWS", global = true)]
    pub chunk_size: Option<usize>,

    /// Transform batch rows on the calling thread only.
    #[arg(long = "no-parallel", global = true)]
    pub no_parallel: bool,

    /// Field delimiter for CSV input.
    #[arg(long = "delimiter", value_name = "CHAR", global = true)]
    pub delimiter: Option<char>,
}

impl PipelineArgs {
    pub fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            missing_key_policy: self.missing_key.map(MissingKeyPolicy::from),
            reject_extra_fields: self.reject_extra_fields,
            chunk_size: self.chunk_size,
            no_parallel: self.no_parallel,
            delimiter: self.delimiter,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Fit aggregates and encodings on a reference dataset and write an artifact.
    Build(BuildArgs),

    /// Re-check every file of an artifact against its manifest.
    Verify(ArtifactArgs),

    /// Show the raw upload columns and the model's feature order.
    Schema(ArtifactArgs),

    /// Predict a single order given as NAME=VALUE fields.
    Predict(PredictArgs),

    /// Predict every row of a CSV file.
    Batch(BatchArgs),
}

#[derive(Parser)]
pub struct BuildArgs {
    /// Reference (training) order dataset.
    #[arg(long = "reference", value_name = "CSV")]
    pub reference: PathBuf,

    /// Tree ensemble model definition.
    #[arg(long = "model", value_name = "JSON")]
    pub model: PathBuf,

    /// Artifact directory to write.
    #[arg(long = "out", value_name = "DIR")]
    pub out: PathBuf,
}

#[derive(Parser)]
pub struct ArtifactArgs {
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,
}

#[derive(Parser)]
pub struct PredictArgs {
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Order field, e.g. --set market=LATAM (repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub fields: Vec<(String, String)>,
}

#[derive(Parser)]
pub struct BatchArgs {
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Orders to predict.
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Write per-row predictions here.
    #[arg(long = "output", value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Hide the progress bar.
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MissingKeyArg {
    /// Fail the row.
    Fail,
    /// Use the statistic over the whole reference column.
    GlobalDefault,
}

impl From<MissingKeyArg> for MissingKeyPolicy {
    fn from(arg: MissingKeyArg) -> Self {
        match arg {
            MissingKeyArg::Fail => Self::Fail,
            MissingKeyArg::GlobalDefault => Self::GlobalDefault,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => Self::ERROR,
            LogLevelArg::Warn => Self::WARN,
            LogLevelArg::Info => Self::INFO,
            LogLevelArg::Debug => Self::DEBUG,
            LogLevelArg::Trace => Self::TRACE,
        }
    }
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Compact => Self::Compact,
            LogFormatArg::Json => Self::Json,
        }
    }
}
