//! CLI module for ee-scout
//!
//! Command-line parsing for the `ee-scout` binary. Uses clap for argument
//! parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Region;

/// ee-scout - recursive research for electrical engineering
///
/// Decomposes an engineering research question into a tree of literature,
/// patent, datasheet, supply-chain and component lookups, runs them in
/// parallel and returns a deduplicated, TRL-annotated report.
#[derive(Parser, Debug)]
#[command(
    name = "ee-scout",
    version,
    about = "ee-scout - recursive research for electrical engineering",
    long_about = "Decomposes an engineering research question into a tree of literature,\n\
                  patent, datasheet, supply-chain and component lookups, executes them\n\
                  in parallel and merges the results into a ranked, TRL-annotated report.\n\n\
                  Run without arguments to start the API server.",
    after_help = "EXAMPLES:\n    \
                  ee-scout init                                        # Scaffold scout.toml and sample catalogs\n    \
                  ee-scout plan \"GaN power ICs, 48V automotive\"        # Show the task tree\n    \
                  ee-scout research \"TRL of solid-state batteries\"     # Run a query\n    \
                  ee-scout research \"SiC MOSFETs\" --region EU --json   # Machine-readable output\n    \
                  ee-scout                                             # Start the server"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "scout.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Query options shared by `research` and `plan`
#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// The research question
    pub query: String,

    /// Maximum decomposition depth
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Maximum children per node
    #[arg(short, long)]
    pub fanout: Option<usize>,

    /// Restrict component results to these regions (EU, Asia, US, Global)
    #[arg(short, long = "region", value_parser = parse_region)]
    pub regions: Vec<Region>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan and execute a research query
    Research {
        #[command(flatten)]
        query: QueryArgs,

        /// Whole-tree time budget in seconds
        #[arg(short, long)]
        budget: Option<u64>,

        /// Print the result as JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Show the task tree a query decomposes into, without executing it
    Plan {
        #[command(flatten)]
        query: QueryArgs,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server (the default)
    Serve,

    /// Initialize a workspace with scout.toml and sample catalogs
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Skip the sample catalogs
        #[arg(long)]
        no_examples: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and report warnings
        #[arg(long)]
        validate: bool,
    },
}

fn parse_region(value: &str) -> Result<Region, String> {
    value.parse().map_err(|e: crate::types::AppError| e.to_string())
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_research_args() {
        let cli = Cli::try_parse_from([
            "ee-scout",
            "research",
            "GaN power ICs",
            "--depth",
            "3",
            "--region",
            "eu",
            "--region",
            "Asia",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Research { query, budget, json }) => {
                assert_eq!(query.query, "GaN power ICs");
                assert_eq!(query.depth, Some(3));
                assert_eq!(query.fanout, None);
                assert_eq!(query.regions, vec![Region::Eu, Region::Asia]);
                assert_eq!(budget, None);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_region_is_rejected() {
        assert!(Cli::try_parse_from(["ee-scout", "plan", "GaN", "--region", "mars"]).is_err());
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["ee-scout", "--config", "other.toml", "--log-json"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.log_json);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
