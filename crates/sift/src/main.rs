// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sift - Adaptive retrieval-augmentation engine.
//!
//! This is the binary entry point for the Sift engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod generation;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sift_config::model::SiftConfig;

/// Sift - Adaptive retrieval-augmentation engine.
#[derive(Parser, Debug)]
#[command(name = "sift", version, about, long_about = None)]
struct Cli {
    /// Explicit configuration file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and print the effective configuration.
    Config,
    /// Launch an interactive REPL over fixture data.
    Shell {
        /// JSON fixture file with content, events and actions.
        #[arg(long)]
        fixtures: Option<PathBuf>,
        /// User the session runs as.
        #[arg(long, default_value = "local")]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => sift_config::load_and_validate_path(path),
        None => sift_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            sift_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Config) => {
            if let Err(e) = print_config(&config) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Shell { fixtures, user }) => {
            init_tracing(&config.engine.log_level);
            if let Err(e) = shell::run_shell(config, fixtures, user).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("sift: use --help for available commands");
        }
    }
}

fn print_config(config: &SiftConfig) -> Result<(), toml::ser::Error> {
    let rendered = toml::to_string_pretty(config)?;
    println!("# sift: configuration valid");
    print!("{rendered}");
    Ok(())
}

/// Initialize the tracing subscriber with an env-filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sift={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
