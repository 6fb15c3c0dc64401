//! chart-matrix CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// chart-matrix - Generate and run Helm chart CI test matrices
#[derive(Parser, Debug)]
#[command(name = "chart-matrix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the matrix for the active chart versions
    List(commands::list::ListArgs),
    /// Deploy every matrix entry
    Run(commands::run::RunArgs),
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &str {
        match &self.command {
            Commands::Run(args) => &args.log_level,
            Commands::List(_) => "info",
        }
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::List(args) => commands::list::run(args),
            Commands::Run(args) => commands::run::run(args).await,
        }
    }
}
