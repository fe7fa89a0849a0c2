// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "lowlight")]
#[command(about = "Temporal denoising and auto-exposure for low-light video")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process frames from a source and report per-frame statistics
    Run(cli::RunArgs),

    /// Show which GPU adapter the GPU engine would use
    Adapters,

    /// Print the effective configuration as JSON
    Config {
        /// JSON configuration file to start from
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: cli::ConfigOverrides,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=lowlight=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cli::run(args),
        Commands::Adapters => cli::show_adapter(),
        Commands::Config { config, overrides } => cli::print_config(config, overrides),
    }
}
