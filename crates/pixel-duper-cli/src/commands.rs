use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pixel-duper")]
#[command(about = "Find duplicate and near-duplicate images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash, fingerprint and match every image under the configured paths
    Scan {
        /// Scan these paths instead of the configured root_paths
        paths: Vec<String>,
        /// Merge overlapping groups into disjoint clusters before reporting
        #[arg(long)]
        recluster: bool,
        /// Also write the groups to a CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
    /// Display the number of entries in the signature cache
    CountCache,
    /// Print configuration values
    PrintConfig,
    /// Delete the signature cache
    ClearCache,
}
