//! order-risk CLI.

use std::fmt::Display;
use std::process::exit;

use clap::Parser;
use order_cli::config::resolve_options;
use order_cli::logging::init_logging;

mod cli;
mod commands;
mod summary;
mod types;

use crate::cli::{Cli, Command};
use crate::commands::{run_batch, run_build, run_predict, run_schema, run_verify};
use crate::summary::{print_batch_summary, print_prediction, print_verify_summary};

/// Exit code for unusable options, matching clap's usage errors.
const EXIT_USAGE: i32 = 2;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&cli.log_config()) {
        eprintln!("error: failed to initialize logging: {error}");
        exit(1);
    }
    let options = match resolve_options(cli.pipeline.config.as_deref(), &cli.pipeline.overrides())
    {
        Ok(options) => options,
        Err(error) => {
            eprintln!("error: {error:#}");
            exit(EXIT_USAGE);
        }
    };
    let exit_code = match &cli.command {
        Command::Build(args) => run_build(args, &options).map_or_else(fail, |summary| {
            print_verify_summary(&summary);
            0
        }),
        Command::Verify(args) => run_verify(args).map_or_else(fail, |summary| {
            print_verify_summary(&summary);
            0
        }),
        Command::Schema(args) => run_schema(args).map_or_else(fail, |()| 0),
        Command::Predict(args) => run_predict(args, &options).map_or_else(fail, |result| {
            print_prediction(&result);
            i32::from(result.is_err())
        }),
        Command::Batch(args) => run_batch(args, &options).map_or_else(fail, |result| {
            print_batch_summary(&result);
            i32::from(result.has_errors())
        }),
    };
    exit(exit_code);
}

fn fail(error: impl Display) -> i32 {
    eprintln!("error: {error:#}");
    1
}
