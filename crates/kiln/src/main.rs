//! Kiln CLI - static-site asset pipeline with live reload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Build a static site from src/ into dist/ and serve it with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Port to listen on (build-then-serve only)
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not open browser (build-then-serve only)
    #[arg(long)]
    no_open: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the output directory and run every transform once
    Build,

    /// Watch sources and serve the existing output directory
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = config::load(&cli.config)?;
    let root = std::env::current_dir().context("Failed to read the working directory")?;

    // Execute command
    match cli.command {
        Some(Commands::Build) => {
            commands::build::run(&root, &config).await?;
        }
        Some(Commands::Serve { port, no_open }) => {
            commands::serve::run(&root, &config, port, !no_open).await?;
        }
        None => {
            commands::build::run(&root, &config).await?;
            commands::serve::run(&root, &config, cli.port, !cli.no_open).await?;
        }
    }

    Ok(())
}
