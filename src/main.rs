//! segtool command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use segtool::cli::{self, CliArgs};
use segtool::config::ConfigStore;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let store = match &args.config {
        Some(path) => ConfigStore::load(path),
        None => ConfigStore::load_default(),
    };

    // RUST_LOG overrides the configured level.
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        store.get().editor.log_level.to_level_filter()
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    log::debug!("Using configuration {:?}", store.path());

    cli::run(args, store)
}
