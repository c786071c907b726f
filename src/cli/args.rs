//! CLI argument definitions using clap
//!
//! Commands:
//! - mongoquery explain --config <path>
//! - mongoquery query --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mongoquery - compile Mongo-style query documents into relational plans
#[derive(Parser, Debug)]
#[command(name = "mongoquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a query read from stdin and print its plan
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./mongoquery.json")]
        config: PathBuf,
    },

    /// Compile and execute a query read from stdin, then print the rows
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./mongoquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
