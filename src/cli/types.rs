//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scrivener")]
#[command(about = "Scrivener - quality-gated generation and prompt tuning", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file (defaults to ./scrivener.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan text for rule violations
    Scan {
        /// Text to scan; reads stdin when neither TEXT nor --file is given
        #[arg(conflicts_with = "file")]
        text: Option<String>,

        /// File to scan
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Rule file (overrides `rules_path`)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Also score the text with the rubric judge
        #[arg(short, long)]
        evaluate: bool,
    },

    /// Generate text through the accept/retry loop
    Generate {
        /// What to write
        #[arg(short, long)]
        task: String,

        /// YAML list of reference excerpts
        #[arg(short, long)]
        excerpts: Option<PathBuf>,

        /// Write the full session record as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Tune the base prompt variant against a set of scenarios
    Optimize {
        /// YAML list of scenarios
        #[arg(short, long)]
        scenarios: PathBuf,

        /// Round budget per scenario (overrides config)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Write the optimization summary as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
