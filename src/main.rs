mod cli;
mod commands;
mod fields;
mod identity;
mod layout;
mod ledger;
mod model;
mod registry;
mod util;
mod writer;
mod zones;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Scan(args) => commands::scan::run(args),
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Process(args) => commands::process::run(args),
        Commands::Regenerate(args) => commands::regenerate::run(args),
        Commands::Archive(args) => commands::archive::run_archive(args),
        Commands::Restore(args) => commands::archive::run_restore(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
