use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use slcaddr::config_loader;
use slcaddr::orchestrator::{run_operation, Operation};

/// Address allocation and validation for signaling-line circuit branches
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the branch YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Addressing operation to run
    #[arg(short, long, value_enum, default_value = "validate")]
    operation: Operation,

    /// Device id for first-available
    #[arg(short, long)]
    device: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Branch file: {:?}", args.config);
    info!("Operation: {:?}", args.operation);

    let config = config_loader::load_config(&args.config)?;
    let report = run_operation(&config, args.operation, args.device.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).wrap_err("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print!("{}", report);
    }

    Ok(())
}
