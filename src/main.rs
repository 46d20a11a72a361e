pub mod config;
pub mod contexts;
pub mod error;
pub mod exporter;
pub mod frontmatter;
pub mod importer;
pub mod md2wp;
pub mod post;
pub mod taxonomy;
pub mod wordpress;

use std::process::exit;

use clap::Parser;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use crate::config::Config;
use crate::md2wp::Args;

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        eprintln!("Error: could not initialize logging.");
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{:#}", e);
            exit(1);
        }
    };

    if let Err(e) = md2wp::run(&args, &config) {
        log::error!("{:#}", e);
        exit(1);
    }

    log::info!("Finished");
}
