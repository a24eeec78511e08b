//! Command-line interface definitions for Patrakaarita.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Global options can also be provided via environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Patrakaarita news article analyzer.
///
/// # Examples
///
/// ```sh
/// # Analyze one article and print the report
/// patrakaarita analyze https://example.com/news/story
///
/// # Print the full analysis as JSON without saving a report file
/// patrakaarita analyze --json --no-save https://example.com/news/story
///
/// # Run the web interface
/// patrakaarita serve --bind 0.0.0.0:8000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true, env = "PATRAKAARITA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, extract, and analyze a single news article
    Analyze {
        /// Article URL (http or https)
        url: String,

        /// Print the full analysis as JSON instead of the text report
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Serve the web interface and HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "PATRAKAARITA_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Do not write the report file
    #[arg(long)]
    pub no_save: bool,

    /// Report file path (overrides config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    /// The report path to write, if saving is enabled.
    pub fn resolve(&self, configured: &std::path::Path) -> Option<PathBuf> {
        (!self.no_save).then(|| {
            self.output
                .clone()
                .unwrap_or_else(|| configured.to_path_buf())
        })
    }
}
