#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use hourbook_tools::cli::{execute, Cli, CliContext};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HOURBOOK_LOG";
const DEFAULT_LOG_FILTER: &str = "warn,hourbook_storage=info,hourbook_os=info";

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = CliContext::from_cli(&cli, chrono::Local::now().naive_local());
    let output = execute(&cli.command, &ctx)
        .map_err(anyhow::Error::msg)
        .context("hourbook")?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
