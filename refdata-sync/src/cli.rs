//! Command line interface.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "refdata-sync")]
#[command(
    about = "Harvest reference data into the search index and keep the shared cache warm",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional .env file loaded before reading the environment
    #[arg(long, global = true)]
    pub env_file: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Harvest every data type and replace its documents in the search index
    Index {
        /// Restrict the run to these data types (repeatable)
        #[arg(long = "data-type")]
        data_types: Vec<String>,
    },
    /// Populate the shared cache once across all starting processes
    WarmCache,
    /// Reload the shared cache from the search index
    ReloadCache,
    /// Read the shared cache and print per data type counts
    Show,
    /// Fill gaps in the organization CSV from the remote registry
    ReconcileOrganizations,
}
