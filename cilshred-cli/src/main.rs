mod app;

use anyhow::Context;
use clap::Parser;
use cilshred::{ShredOptions, Shredder};

use crate::app::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // cilshred info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("cilshred", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let options = ShredOptions::new().keep_auxiliary_tables(cli.keep_aux_tables);
    let report = Shredder::new()
        .with_options(options)
        .run(&cli.input, cli.output.as_deref())
        .with_context(|| format!("failed to shred {}", cli.input.display()))?;

    match report {
        Some(report) => println!(
            "{}: shredded {} bodies in {} types ({} modules written)",
            report.output.display(),
            report.stats.bodies_shredded,
            report.stats.types_visited,
            report.modules_written
        ),
        None => println!("{}: not found, nothing to do", cli.input.display()),
    }

    Ok(())
}
